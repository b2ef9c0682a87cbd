//! S3 endpoints (`/config/s3`), referenced by S3-backed datastores

use reconcile::schema::{FieldSpec, ResourceKind, ResourceSchema, VariantSchema};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::string("access_key", "access-key").required(),
    FieldSpec::string("secret_key", "secret-key").required().secret(),
    FieldSpec::string("endpoint", "endpoint").required(),
    FieldSpec::string("region", "region"),
    FieldSpec::string("fingerprint", "fingerprint"),
    FieldSpec::integer("port", "port"),
    FieldSpec::boolean("path_style", "path-style"),
    FieldSpec::list("provider_quirks", "provider-quirks"),
    FieldSpec::string("put_rate_limit", "put-rate-limit"),
];

pub static SCHEMA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::S3Endpoint,
    discriminator: None,
    variants: &[VariantSchema {
        name: "s3",
        collection: "/config/s3",
        key: "id",
        fields: FIELDS,
        legacy: &[],
    }],
};
