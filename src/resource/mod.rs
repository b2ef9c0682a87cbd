//! Resource catalog
//!
//! One schema table per resource family. The tables describe the current
//! server wire schema; older declaration shapes are handled through each
//! variant's legacy rules.

pub mod datastore;
pub mod jobs;
pub mod metrics;
pub mod notifications;
pub mod remote;
pub mod s3;

use pbskit::MockApi;
use reconcile::{ResourceKind, ResourceSchema};

/// Schema table for a resource family
pub fn schema(kind: ResourceKind) -> &'static ResourceSchema {
    match kind {
        ResourceKind::Datastore => &datastore::SCHEMA,
        ResourceKind::Remote => &remote::SCHEMA,
        ResourceKind::MetricsExporter => &metrics::SCHEMA,
        ResourceKind::NotificationTarget => &notifications::TARGETS,
        ResourceKind::NotificationMatcher => &notifications::MATCHERS,
        ResourceKind::Job => &jobs::SCHEMA,
        ResourceKind::S3Endpoint => &s3::SCHEMA,
    }
}

/// All schema tables, in catalog order
pub fn all() -> impl Iterator<Item = &'static ResourceSchema> {
    ResourceKind::ALL.into_iter().map(schema)
}

/// Mock server with a collection for every variant in the catalog
///
/// Write-only fields are hidden on read, like the real server does.
pub fn mock_server() -> MockApi {
    let mock = MockApi::new();
    for variant in all().flat_map(|schema| schema.variants) {
        let write_only: Vec<&str> = variant
            .fields
            .iter()
            .filter(|f| f.is_write_only())
            .map(|f| f.wire)
            .collect();
        mock.register(variant.collection, variant.key, &write_only);
    }
    mock
}
