//! Notification targets and matchers (`/config/notifications`)
//!
//! Targets are one family with four endpoint types. Built-in entries report
//! `origin`, which is never written.

use reconcile::schema::{FieldDefault, FieldSpec, ResourceKind, ResourceSchema, VariantSchema};

const SMTP_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("server", "server").required(),
    FieldSpec::integer("port", "port"),
    FieldSpec::string("mode", "mode"),
    FieldSpec::string("username", "username"),
    FieldSpec::string("password", "password").secret(),
    FieldSpec::string("from_address", "from-address").required(),
    FieldSpec::list("mailto", "mailto"),
    FieldSpec::list("mailto_user", "mailto-user"),
    FieldSpec::string("author", "author"),
    FieldSpec::string("comment", "comment"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("origin", "origin").read_only(),
];

const SENDMAIL_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("from_address", "from-address"),
    FieldSpec::list("mailto", "mailto"),
    FieldSpec::list("mailto_user", "mailto-user"),
    FieldSpec::string("author", "author"),
    FieldSpec::string("comment", "comment"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("origin", "origin").read_only(),
];

const GOTIFY_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("server", "server").required(),
    FieldSpec::string("token", "token").required().secret(),
    FieldSpec::string("comment", "comment"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("origin", "origin").read_only(),
];

/// Headers and secrets are `name=...,value=...` property strings
const WEBHOOK_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("url", "url").required(),
    FieldSpec::string("method", "method").required(),
    FieldSpec::string("body", "body"),
    FieldSpec::list("header", "header"),
    FieldSpec::list("secret", "secret").secret(),
    FieldSpec::string("comment", "comment"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("origin", "origin").read_only(),
];

pub static TARGETS: ResourceSchema = ResourceSchema {
    kind: ResourceKind::NotificationTarget,
    discriminator: Some("type"),
    variants: &[
        VariantSchema {
            name: "smtp",
            collection: "/config/notifications/endpoints/smtp",
            key: "name",
            fields: SMTP_FIELDS,
            legacy: &[],
        },
        VariantSchema {
            name: "sendmail",
            collection: "/config/notifications/endpoints/sendmail",
            key: "name",
            fields: SENDMAIL_FIELDS,
            legacy: &[],
        },
        VariantSchema {
            name: "gotify",
            collection: "/config/notifications/endpoints/gotify",
            key: "name",
            fields: GOTIFY_FIELDS,
            legacy: &[],
        },
        VariantSchema {
            name: "webhook",
            collection: "/config/notifications/endpoints/webhook",
            key: "name",
            fields: WEBHOOK_FIELDS,
            legacy: &[],
        },
    ],
};

const MATCHER_FIELDS: &[FieldSpec] = &[
    FieldSpec::list("target", "target"),
    FieldSpec::list("match_severity", "match-severity"),
    FieldSpec::list("match_field", "match-field"),
    FieldSpec::list("match_calendar", "match-calendar"),
    FieldSpec::string("mode", "mode"),
    FieldSpec::boolean("invert_match", "invert-match"),
    FieldSpec::string("comment", "comment"),
    FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
    FieldSpec::string("origin", "origin").read_only(),
];

pub static MATCHERS: ResourceSchema = ResourceSchema {
    kind: ResourceKind::NotificationMatcher,
    discriminator: None,
    variants: &[VariantSchema {
        name: "matcher",
        collection: "/config/notifications/matchers",
        key: "name",
        fields: MATCHER_FIELDS,
        legacy: &[],
    }],
};
