//! Metrics exporters (`/config/metrics/<type>`)
//!
//! Older declarations spell the InfluxDB HTTP target as `server`, `port` and
//! `scheme`, and the UDP target as `server` and `port`. Both are folded into
//! the single `url` / `host` field the server expects now.

use reconcile::schema::{
    FieldDefault, FieldSpec, LegacyRule, ResourceKind, ResourceSchema, VariantSchema,
};

const HTTP_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("url", "url").required(),
    FieldSpec::string("organization", "organization"),
    FieldSpec::string("bucket", "bucket"),
    FieldSpec::string("token", "token").secret(),
    FieldSpec::integer("max_body_size", "max-body-size").default(FieldDefault::Int(25_000_000)),
    FieldSpec::boolean("verify_tls", "verify-tls").default(FieldDefault::Bool(true)),
    FieldSpec::boolean("enable", "enable").default(FieldDefault::Bool(true)),
    FieldSpec::string("comment", "comment"),
];

const HTTP_LEGACY: &[LegacyRule] = &[
    LegacyRule::ComposeUrl {
        canonical: "url",
        host: "server",
        port: "port",
        scheme: "scheme",
        default_scheme: "https",
    },
    LegacyRule::Rename {
        legacy: "verify_certificate",
        canonical: "verify_tls",
    },
];

const UDP_FIELDS: &[FieldSpec] = &[
    FieldSpec::string("host", "host").required(),
    FieldSpec::integer("mtu", "mtu").default(FieldDefault::Int(1500)),
    FieldSpec::boolean("enable", "enable").default(FieldDefault::Bool(true)),
    FieldSpec::string("comment", "comment"),
];

const UDP_LEGACY: &[LegacyRule] = &[LegacyRule::ComposeHostPort {
    canonical: "host",
    host: "server",
    port: "port",
}];

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::MetricsExporter,
    discriminator: Some("type"),
    variants: &[
        VariantSchema {
            name: "influxdb-http",
            collection: "/config/metrics/influxdb-http",
            key: "name",
            fields: HTTP_FIELDS,
            legacy: HTTP_LEGACY,
        },
        VariantSchema {
            name: "influxdb-udp",
            collection: "/config/metrics/influxdb-udp",
            key: "name",
            fields: UDP_FIELDS,
            legacy: UDP_LEGACY,
        },
    ],
};
