//! Sync remotes (`/config/remote`)

use reconcile::schema::{FieldSpec, ResourceKind, ResourceSchema, VariantSchema};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("host", "host").required(),
    FieldSpec::integer("port", "port"),
    FieldSpec::string("auth_id", "auth-id").required(),
    FieldSpec::string("password", "password").required().secret(),
    FieldSpec::string("fingerprint", "fingerprint"),
    FieldSpec::string("comment", "comment"),
];

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Remote,
    discriminator: None,
    variants: &[VariantSchema {
        name: "remote",
        collection: "/config/remote",
        key: "name",
        fields: FIELDS,
        legacy: &[],
    }],
};
