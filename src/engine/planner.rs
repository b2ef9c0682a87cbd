//! Change planning - what an apply would do, without doing it

use reconcile::{
    DeclaredState, FieldDelta, ObservedState, ResourceKind, ResourceSchema, codec, delta, dispatch,
};
use std::fmt;

use crate::resource;

/// Planned action for one resource instance
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Create,
    /// In-place update with the fields to send
    Update(FieldDelta),
    /// Delete followed by create
    Replace { reason: String },
    Delete,
    NoChange,
}

impl Change {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update(delta) => write!(f, "update ({} fields)", delta.len()),
            Self::Replace { reason } => write!(f, "replace: {reason}"),
            Self::Delete => write!(f, "delete"),
            Self::NoChange => write!(f, "no change"),
        }
    }
}

/// Decide what it takes to go from `prior` to `next`
///
/// A discriminator, natural key or create-only change plans a replacement.
/// Declarations are checked as they would be on create, so a plan never
/// contains a change that is bound to fail before reaching the server.
pub fn plan_change(
    schema: &ResourceSchema,
    prior: Option<&ObservedState>,
    next: Option<&DeclaredState>,
) -> reconcile::Result<Change> {
    match (prior, next) {
        (None, None) => Ok(Change::NoChange),
        (None, Some(next)) => {
            check_creatable(schema, next)?;
            Ok(Change::Create)
        }
        (Some(_), None) => Ok(Change::Delete),
        (Some(prior), Some(next)) => {
            let planned = dispatch::check_in_place(schema, prior, next)
                .and_then(|variant| delta::compute(variant, prior, next));
            match planned {
                Ok(delta) if delta.is_empty() => Ok(Change::NoChange),
                Ok(delta) => Ok(Change::Update(delta)),
                Err(e) if e.requires_replacement() => {
                    check_creatable(schema, next)?;
                    Ok(Change::Replace {
                        reason: e.to_string(),
                    })
                }
                Err(e) => Err(e),
            }
        }
    }
}

fn check_creatable(schema: &ResourceSchema, declared: &DeclaredState) -> reconcile::Result<()> {
    let variant = dispatch::variant_for(schema, declared)?;
    codec::encode(variant, declared)?;
    Ok(())
}

/// One resource instance to converge
#[derive(Debug, Clone, PartialEq)]
pub struct PlanItem {
    pub kind: ResourceKind,
    /// Last observed state; `None` if the object does not exist yet
    pub prior: Option<ObservedState>,
    /// Desired state; `None` to delete
    pub next: Option<DeclaredState>,
}

impl PlanItem {
    pub fn create(kind: ResourceKind, next: DeclaredState) -> Self {
        Self {
            kind,
            prior: None,
            next: Some(next),
        }
    }

    pub fn update(kind: ResourceKind, prior: ObservedState, next: DeclaredState) -> Self {
        Self {
            kind,
            prior: Some(prior),
            next: Some(next),
        }
    }

    pub fn delete(kind: ResourceKind, prior: ObservedState) -> Self {
        Self {
            kind,
            prior: Some(prior),
            next: None,
        }
    }

    /// Identifier like `remote:offsite` or `job:sync/nightly`
    pub fn id(&self) -> String {
        let key = match (&self.prior, &self.next) {
            (Some(prior), _) => prior.key.to_string(),
            (None, Some(next)) => {
                let schema = resource::schema(self.kind);
                dispatch::variant_for(schema, next)
                    .and_then(|variant| dispatch::key_for(schema, variant, next))
                    .map_or_else(|_| "<unnamed>".to_string(), |key| key.to_string())
            }
            (None, None) => "<unnamed>".to_string(),
        };
        format!("{}:{}", self.kind, key)
    }

    /// Plan this item against the catalog
    pub fn plan(&self) -> reconcile::Result<Change> {
        plan_change(
            resource::schema(self.kind),
            self.prior.as_ref(),
            self.next.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ResourceKey;
    use serde_json::json;

    fn udp(name: &str) -> DeclaredState {
        DeclaredState::new()
            .with("type", "influxdb-udp")
            .with("name", name)
            .with("host", "influx.local:8089")
    }

    fn observed_udp(name: &str) -> ObservedState {
        let mut observed = ObservedState::new(ResourceKey::with_variant("influxdb-udp", name));
        observed.set("type", json!("influxdb-udp"));
        observed.set("name", json!(name));
        observed.set("host", json!("influx.local:8089"));
        observed.set("mtu", json!(1500));
        observed.set("enable", json!(true));
        observed
    }

    #[test]
    fn test_plan_create_and_delete() {
        let schema = resource::schema(ResourceKind::MetricsExporter);
        assert_eq!(
            plan_change(schema, None, Some(&udp("u1"))).unwrap(),
            Change::Create
        );
        assert_eq!(
            plan_change(schema, Some(&observed_udp("u1")), None).unwrap(),
            Change::Delete
        );
        assert_eq!(plan_change(schema, None, None).unwrap(), Change::NoChange);
    }

    #[test]
    fn test_plan_create_checks_required_fields() {
        let schema = resource::schema(ResourceKind::MetricsExporter);
        let declared = DeclaredState::new()
            .with("type", "influxdb-udp")
            .with("name", "u1");
        assert!(plan_change(schema, None, Some(&declared)).is_err());
    }

    #[test]
    fn test_plan_no_change_with_defaults() {
        let schema = resource::schema(ResourceKind::MetricsExporter);
        let change = plan_change(schema, Some(&observed_udp("u1")), Some(&udp("u1"))).unwrap();
        assert_eq!(change, Change::NoChange);
        assert!(!change.is_change());
    }

    #[test]
    fn test_plan_update() {
        let schema = resource::schema(ResourceKind::MetricsExporter);
        let next = udp("u1").with("mtu", 9000);
        match plan_change(schema, Some(&observed_udp("u1")), Some(&next)).unwrap() {
            Change::Update(delta) => {
                assert_eq!(delta.set.get("mtu"), Some(&json!(9000)));
                assert!(delta.clear.is_empty());
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_discriminator_change_is_replace() {
        let schema = resource::schema(ResourceKind::MetricsExporter);
        let next = DeclaredState::new()
            .with("type", "influxdb-http")
            .with("name", "u1")
            .with("url", "https://influx.local:8086");
        let change = plan_change(schema, Some(&observed_udp("u1")), Some(&next)).unwrap();
        assert!(matches!(change, Change::Replace { .. }));
        assert!(change.to_string().contains("type"));
    }

    #[test]
    fn test_plan_item_id() {
        let item = PlanItem::create(ResourceKind::MetricsExporter, udp("u1"));
        assert_eq!(item.id(), "metrics_exporter:influxdb-udp/u1");

        let item = PlanItem::delete(ResourceKind::MetricsExporter, observed_udp("u2"));
        assert_eq!(item.id(), "metrics_exporter:influxdb-udp/u2");
        assert_eq!(item.plan().unwrap(), Change::Delete);
    }
}
