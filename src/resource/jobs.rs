//! Prune, sync and verification jobs
//!
//! Each job type lives under its own collection but all share an `id` key,
//! so they form one family keyed by `type`.

use reconcile::schema::{FieldDefault, FieldSpec, ResourceKind, ResourceSchema, VariantSchema};

const PRUNE_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("store", "store").required(),
    FieldSpec::string("schedule", "schedule").required(),
    FieldSpec::string("ns", "ns"),
    FieldSpec::integer("max_depth", "max-depth"),
    FieldSpec::integer("keep_last", "keep-last"),
    FieldSpec::integer("keep_hourly", "keep-hourly"),
    FieldSpec::integer("keep_daily", "keep-daily"),
    FieldSpec::integer("keep_weekly", "keep-weekly"),
    FieldSpec::integer("keep_monthly", "keep-monthly"),
    FieldSpec::integer("keep_yearly", "keep-yearly"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("comment", "comment"),
];

const SYNC_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("store", "store").required(),
    FieldSpec::string("remote", "remote"),
    FieldSpec::string("remote_store", "remote-store").required(),
    FieldSpec::string("remote_ns", "remote-ns"),
    FieldSpec::string("ns", "ns"),
    FieldSpec::integer("max_depth", "max-depth"),
    FieldSpec::string("schedule", "schedule"),
    FieldSpec::list("group_filter", "group-filter"),
    FieldSpec::boolean("remove_vanished", "remove-vanished"),
    FieldSpec::boolean("resync_corrupt", "resync-corrupt"),
    FieldSpec::boolean("encrypted_only", "encrypted-only"),
    FieldSpec::boolean("verified_only", "verified-only"),
    FieldSpec::boolean("run_on_mount", "run-on-mount"),
    FieldSpec::integer("transfer_last", "transfer-last"),
    FieldSpec::string("sync_direction", "sync-direction"),
    FieldSpec::string("owner", "owner"),
    FieldSpec::string("rate_in", "rate-in"),
    FieldSpec::string("rate_out", "rate-out"),
    FieldSpec::string("burst_in", "burst-in"),
    FieldSpec::string("burst_out", "burst-out"),
    FieldSpec::string("comment", "comment"),
];

const VERIFY_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("store", "store").required(),
    FieldSpec::string("schedule", "schedule"),
    FieldSpec::boolean("ignore_verified", "ignore-verified"),
    FieldSpec::integer("outdated_after", "outdated-after"),
    FieldSpec::string("ns", "ns"),
    FieldSpec::integer("max_depth", "max-depth"),
    FieldSpec::string("comment", "comment"),
];

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Job,
    discriminator: Some("type"),
    variants: &[
        VariantSchema {
            name: "prune",
            collection: "/config/prune",
            key: "id",
            fields: PRUNE_FIELDS,
            legacy: &[],
        },
        VariantSchema {
            name: "sync",
            collection: "/config/sync",
            key: "id",
            fields: SYNC_FIELDS,
            legacy: &[],
        },
        VariantSchema {
            name: "verify",
            collection: "/config/verify",
            key: "id",
            fields: VERIFY_FIELDS,
            legacy: &[],
        },
    ],
};
