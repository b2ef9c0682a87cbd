//! Datastores (`/config/datastore`)

use reconcile::schema::{FieldDefault, FieldSpec, ResourceKind, ResourceSchema, SubField, VariantSchema};

const MAINTENANCE_MODE: &[SubField] = &[
    SubField::string("type", "type"),
    SubField::string("message", "message"),
];

/// Per-job notification setting: `always`, `error` or `never`
const NOTIFY: &[SubField] = &[
    SubField::string("gc", "gc"),
    SubField::string("prune", "prune"),
    SubField::string("sync", "sync"),
    SubField::string("verify", "verify"),
];

const TUNING: &[SubField] = &[
    SubField::string("chunk_order", "chunk-order"),
    SubField::integer("gc_atime_cutoff", "gc-atime-cutoff"),
    SubField::boolean("gc_atime_safety_check", "gc-atime-safety-check"),
    SubField::integer("gc_cache_capacity", "gc-cache-capacity"),
    SubField::string("sync_level", "sync-level"),
];

/// S3-backed datastores; `client` names an S3 endpoint id
const BACKEND: &[SubField] = &[
    SubField::string("type", "type"),
    SubField::string("client", "client"),
    SubField::string("bucket", "bucket"),
];

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("path", "path").required().create_only(),
    FieldSpec::string("comment", "comment"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("gc_schedule", "gc-schedule"),
    FieldSpec::string("prune_schedule", "prune-schedule"),
    FieldSpec::integer("keep_last", "keep-last"),
    FieldSpec::integer("keep_hourly", "keep-hourly"),
    FieldSpec::integer("keep_daily", "keep-daily"),
    FieldSpec::integer("keep_weekly", "keep-weekly"),
    FieldSpec::integer("keep_monthly", "keep-monthly"),
    FieldSpec::integer("keep_yearly", "keep-yearly"),
    FieldSpec::string("notify_user", "notify-user"),
    FieldSpec::string("notification_mode", "notification-mode"),
    FieldSpec::string("notify_level", "notify-level"),
    FieldSpec::boolean("verify_new", "verify-new"),
    FieldSpec::composite("maintenance_mode", "maintenance-mode", MAINTENANCE_MODE),
    FieldSpec::composite("notify", "notify", NOTIFY),
    FieldSpec::composite("tuning", "tuning", TUNING),
    FieldSpec::string("backing_device", "backing-device").create_only(),
    FieldSpec::composite("backend", "backend", BACKEND).create_only(),
    FieldSpec::boolean("reuse_datastore", "reuse-datastore")
        .write_only()
        .create_only(),
    FieldSpec::boolean("overwrite_in_use", "overwrite-in-use")
        .write_only()
        .create_only(),
];

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Datastore,
    discriminator: None,
    variants: &[VariantSchema {
        name: "datastore",
        collection: "/config/datastore",
        key: "name",
        fields: FIELDS,
        legacy: &[],
    }],
};
