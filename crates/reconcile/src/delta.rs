//! Delta computation between an observed snapshot and a new declaration
//!
//! The remote distinguishes "omitted from the request" (leave unchanged)
//! from "listed for deletion" (clear it). A delta therefore has two parts:
//! wire fields to set and wire fields to clear. The two never overlap.

use crate::codec::{self, WirePayload};
use crate::error::{Error, Result};
use crate::schema::{Access, VariantSchema};
use crate::types::{DeclaredState, ObservedState};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Wire key carrying the removal list in an update body
pub const DELETE_KEY: &str = "delete";

/// Minimal write-set for one update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldDelta {
    /// Wire name -> wire value
    pub set: BTreeMap<String, Value>,
    /// Wire names to remove
    pub clear: BTreeSet<String>,
}

impl FieldDelta {
    /// No change at all; no remote call is needed
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.clear.is_empty()
    }

    /// Number of touched wire fields
    pub fn len(&self) -> usize {
        self.set.len() + self.clear.len()
    }

    /// Check the set/clear disjointness guarantee
    pub fn check_disjoint(&self) -> Result<()> {
        match self.set.keys().find(|k| self.clear.contains(*k)) {
            Some(field) => Err(Error::ContradictoryDelta {
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Render as an update body: set fields plus the `delete` list
    pub fn to_body(&self) -> WirePayload {
        let mut body: WirePayload = self
            .set
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !self.clear.is_empty() {
            body.insert(
                DELETE_KEY.to_string(),
                Value::Array(self.clear.iter().cloned().map(Value::String).collect()),
            );
        }
        body
    }
}

/// Compute the delta from `prior` to `next`
///
/// Both sides are resolved through the codec, so legacy aliases, type
/// coercion and defaults cannot produce spurious changes. Fields are
/// compared one by one:
///
/// - absent on both sides: skipped
/// - present in `next` and different from `prior`: set
/// - present in `prior`, absent in `next`: cleared (required fields may not
///   be cleared; create-only fields need replacement)
/// - write-only field whose prior value is unknown: set when declared,
///   otherwise left alone
///
/// When anything changed, fields flagged `always_send` are added to the
/// write-set even if unchanged. Composites are compared and cleared as a
/// unit.
pub fn compute(
    variant: &VariantSchema,
    prior: &ObservedState,
    next: &DeclaredState,
) -> Result<FieldDelta> {
    variant.validate()?;

    let before = codec::resolve(variant, &prior.as_declared())?;
    let after = codec::resolve(variant, next)?;
    let mut delta = FieldDelta::default();

    for field in variant.fields.iter().filter(|f| f.is_writable()) {
        let new = after.get(field.name);

        if field.is_write_only() && prior.is_unknown(field.name) {
            // create-only flags can be neither observed nor changed later
            if field.access == Access::CreateOnly {
                continue;
            }
            if let Some(value) = new {
                delta
                    .set
                    .insert(field.wire.to_string(), codec::to_wire(field, value));
            }
            continue;
        }

        match (before.get(field.name), new) {
            (None, None) => {}
            (Some(old), Some(new)) if old == new => {}
            (old, Some(new)) => {
                if field.access == Access::CreateOnly {
                    return Err(Error::RequiresReplacement {
                        field: field.name.to_string(),
                        from: old.map_or_else(|| "(unset)".to_string(), render),
                        to: render(new),
                    });
                }
                delta
                    .set
                    .insert(field.wire.to_string(), codec::to_wire(field, new));
            }
            (Some(old), None) => {
                if field.required {
                    return Err(Error::missing(field.name));
                }
                if field.access == Access::CreateOnly {
                    return Err(Error::RequiresReplacement {
                        field: field.name.to_string(),
                        from: render(old),
                        to: "(unset)".to_string(),
                    });
                }
                delta.clear.insert(field.wire.to_string());
            }
        }
    }

    if !delta.is_empty() {
        for field in variant.fields.iter().filter(|f| f.always_send) {
            if let Some(value) = after.get(field.name) {
                delta
                    .set
                    .entry(field.wire.to_string())
                    .or_insert_with(|| codec::to_wire(field, value));
            }
        }
    }

    delta.check_disjoint()?;
    Ok(delta)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefault, FieldSpec, LegacyRule, SubField};
    use crate::types::ResourceKey;
    use serde_json::json;

    const MAINTENANCE: &[SubField] = &[
        SubField::string("type", "type"),
        SubField::string("message", "message"),
    ];

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::string("path", "path").required().create_only(),
        FieldSpec::string("comment", "comment"),
        FieldSpec::string("gc_schedule", "gc-schedule"),
        FieldSpec::integer("keep_last", "keep-last"),
        FieldSpec::boolean("disable", "disable").default(FieldDefault::Bool(false)),
        FieldSpec::composite("maintenance_mode", "maintenance-mode", MAINTENANCE),
        FieldSpec::string("password", "password").secret(),
        FieldSpec::string("auth_id", "auth-id").required().always_send(),
        FieldSpec::string("origin", "origin").read_only(),
        FieldSpec::boolean("reuse_datastore", "reuse-datastore")
            .write_only()
            .create_only(),
    ];

    const STORE: VariantSchema = VariantSchema {
        name: "datastore",
        collection: "/config/datastore",
        key: "name",
        fields: FIELDS,
        legacy: &[LegacyRule::Rename {
            legacy: "schedule",
            canonical: "gc_schedule",
        }],
    };

    fn observed(fields: Value) -> ObservedState {
        let mut observed = ObservedState::new(ResourceKey::new("store1"));
        for (k, v) in fields.as_object().unwrap() {
            observed.set(k, v.clone());
        }
        observed
    }

    fn declared(fields: Value) -> DeclaredState {
        DeclaredState::from_json(fields).unwrap()
    }

    fn base() -> Value {
        json!({
            "name": "store1",
            "path": "/mnt/store1",
            "auth_id": "sync@pbs",
            "disable": false,
        })
    }

    fn with(mut base: Value, extra: Value) -> Value {
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        base
    }

    #[test]
    fn test_identical_state_is_empty() {
        let prior = observed(with(base(), json!({"comment": "x", "keep_last": 3})));
        let next = declared(with(base(), json!({"comment": "x", "keep_last": 3})));
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert!(delta.is_empty(), "unexpected delta: {delta:?}");
    }

    #[test]
    fn test_clear_detection() {
        let prior = observed(with(base(), json!({"comment": "x"})));
        let next = declared(base());
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert_eq!(delta.clear, BTreeSet::from(["comment".to_string()]));
        assert!(!delta.set.contains_key("comment"));
    }

    #[test]
    fn test_explicit_null_clears() {
        let prior = observed(with(base(), json!({"comment": "x"})));
        let next = declared(with(base(), json!({"comment": null})));
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert!(delta.clear.contains("comment"));
    }

    #[test]
    fn test_change_sets_wire_name_and_always_send() {
        let prior = observed(base());
        let next = declared(with(base(), json!({"keep_last": 5})));
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert_eq!(delta.set.get("keep-last"), Some(&json!(5)));
        // unchanged but required on every write
        assert_eq!(delta.set.get("auth-id"), Some(&json!("sync@pbs")));
        assert!(!delta.set.contains_key("path"));
        assert!(delta.clear.is_empty());
    }

    #[test]
    fn test_type_coercion_is_not_a_change() {
        let prior = observed(with(base(), json!({"keep_last": 3})));
        let next = declared(with(base(), json!({"keep_last": "3", "disable": 0})));
        assert!(compute(&STORE, &prior, &next).unwrap().is_empty());
    }

    #[test]
    fn test_default_is_not_a_clear() {
        let prior = observed(base());
        let mut next = declared(base());
        next.unset("disable");
        assert!(compute(&STORE, &prior, &next).unwrap().is_empty());
    }

    #[test]
    fn test_legacy_alias_matches_canonical() {
        let prior = observed(with(base(), json!({"gc_schedule": "daily", "schedule": "daily"})));
        let next = declared(with(base(), json!({"schedule": "daily"})));
        assert!(compute(&STORE, &prior, &next).unwrap().is_empty());
    }

    #[test]
    fn test_composite_cleared_as_unit() {
        let prior = observed(with(
            base(),
            json!({"maintenance_mode": {"type": "offline", "message": "swap"}}),
        ));
        let next = declared(base());
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert_eq!(delta.clear, BTreeSet::from(["maintenance-mode".to_string()]));
    }

    #[test]
    fn test_composite_change_sent_whole() {
        let prior = observed(with(
            base(),
            json!({"maintenance_mode": {"type": "offline", "message": "swap"}}),
        ));
        let next = declared(with(base(), json!({"maintenance_mode": {"type": "offline"}})));
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert_eq!(delta.set.get("maintenance-mode"), Some(&json!("type=offline")));
        assert!(delta.clear.is_empty());
    }

    #[test]
    fn test_required_field_cannot_be_cleared() {
        let prior = observed(base());
        let mut next = declared(base());
        next.unset("auth_id");
        assert_eq!(
            compute(&STORE, &prior, &next).unwrap_err(),
            Error::missing("auth_id")
        );
    }

    #[test]
    fn test_create_only_change_requires_replacement() {
        let prior = observed(base());
        let next = declared(with(base(), json!({"path": "/mnt/other"})));
        let err = compute(&STORE, &prior, &next).unwrap_err();
        assert!(err.requires_replacement());
    }

    #[test]
    fn test_read_only_never_diffed() {
        let prior = observed(with(base(), json!({"origin": "builtin"})));
        let next = declared(with(base(), json!({"origin": "user"})));
        assert!(compute(&STORE, &prior, &next).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_secret() {
        let mut prior = observed(base());
        prior.mark_unknown("password");

        let next = declared(with(base(), json!({"password": "p@ss"})));
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert_eq!(delta.set.get("password"), Some(&json!("p@ss")));

        // an unknown secret is never cleared
        let delta = compute(&STORE, &prior, &declared(base())).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_unknown_create_only_flag_is_skipped() {
        let mut prior = observed(base());
        prior.mark_unknown("reuse_datastore");
        let next = declared(with(base(), json!({"reuse_datastore": true})));
        assert!(compute(&STORE, &prior, &next).unwrap().is_empty());
    }

    #[test]
    fn test_carried_secret_is_unchanged() {
        let prior = observed(with(base(), json!({"password": "p@ss"})));
        let next = declared(with(base(), json!({"password": "p@ss"})));
        assert!(compute(&STORE, &prior, &next).unwrap().is_empty());

        let next = declared(with(base(), json!({"password": "new"})));
        let delta = compute(&STORE, &prior, &next).unwrap();
        assert_eq!(delta.set.get("password"), Some(&json!("new")));
    }

    #[test]
    fn test_to_body_has_delete_list() {
        let delta = FieldDelta {
            set: BTreeMap::from([("comment".to_string(), json!("y"))]),
            clear: BTreeSet::from(["gc-schedule".to_string(), "keep-last".to_string()]),
        };
        let body = delta.to_body();
        assert_eq!(body["comment"], json!("y"));
        assert_eq!(body["delete"], json!(["gc-schedule", "keep-last"]));

        assert!(!FieldDelta::default().to_body().contains_key(DELETE_KEY));
    }

    #[test]
    fn test_check_disjoint() {
        let delta = FieldDelta {
            set: BTreeMap::from([("comment".to_string(), json!("y"))]),
            clear: BTreeSet::from(["comment".to_string()]),
        };
        assert_eq!(
            delta.check_disjoint(),
            Err(Error::ContradictoryDelta {
                field: "comment".to_string()
            })
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const OPTIONAL: [&str; 3] = ["comment", "gc_schedule", "keep_last"];

        fn optional_value(name: &'static str) -> impl Strategy<Value = Option<Value>> {
            let value = if name == "keep_last" {
                (0i64..5).prop_map(Value::from).boxed()
            } else {
                "[a-c]{1,2}".prop_map(Value::from).boxed()
            };
            prop::option::of(value)
        }

        fn state() -> impl Strategy<Value = Vec<Option<Value>>> {
            (
                optional_value(OPTIONAL[0]),
                optional_value(OPTIONAL[1]),
                optional_value(OPTIONAL[2]),
            )
                .prop_map(|(a, b, c)| vec![a, b, c])
        }

        fn fill(values: &[Option<Value>]) -> Value {
            let mut fields = base();
            for (name, value) in OPTIONAL.iter().zip(values) {
                if let Some(value) = value {
                    fields[*name] = value.clone();
                }
            }
            fields
        }

        proptest! {
            #[test]
            fn test_set_and_clear_are_disjoint(prior in state(), next in state()) {
                let delta = compute(&STORE, &observed(fill(&prior)), &declared(fill(&next))).unwrap();
                prop_assert!(delta.set.keys().all(|k| !delta.clear.contains(k)));
            }

            #[test]
            fn test_equal_states_yield_empty_delta(values in state()) {
                let fields = fill(&values);
                let delta = compute(&STORE, &observed(fields.clone()), &declared(fields)).unwrap();
                prop_assert!(delta.is_empty());
            }

            #[test]
            fn test_cleared_fields_were_present(prior in state(), next in state()) {
                let delta = compute(&STORE, &observed(fill(&prior)), &declared(fill(&next))).unwrap();
                for (i, name) in OPTIONAL.iter().enumerate() {
                    let wire = STORE.field(name).unwrap().wire;
                    let expect_clear = prior[i].is_some() && next[i].is_none();
                    prop_assert_eq!(delta.clear.contains(wire), expect_clear);
                }
            }
        }
    }
}
