//! Retention of write-only fields across reads
//!
//! The remote accepts passwords and tokens on write but never returns them.
//! A read must not make them look cleared, or the next delta would try to
//! remove them.

use crate::codec::{self, WirePayload};
use crate::schema::VariantSchema;
use crate::types::{DeclaredState, ObservedState};
use log::{debug, warn};
use serde_json::Value;

const REDACTED: &str = "<redacted>";

/// Patch write-only fields of a fresh read
///
/// A declared value is copied verbatim into the snapshot. A field that is
/// not declared (fresh import, no prior configuration) is marked unknown, so
/// it needs an explicit write rather than being taken as empty.
pub fn retain_secrets(
    variant: &VariantSchema,
    observed: &mut ObservedState,
    declared: Option<&DeclaredState>,
) {
    for field in variant.fields.iter().filter(|f| f.is_write_only()) {
        if observed.value(field.name).is_some() {
            continue;
        }
        let carried = declared
            .and_then(|d| d.value(field.name))
            .and_then(|v| match codec::normalize(field, v) {
                Ok(value) => value,
                Err(e) => {
                    warn!("not carrying write-only field '{}': {}", field.name, e);
                    None
                }
            });
        match carried {
            Some(value) => {
                debug!("carrying forward write-only field '{}'", field.name);
                observed.set(field.name, value);
            }
            None => observed.mark_unknown(field.name),
        }
    }
}

/// Copy of a wire payload with secret fields masked, for logging
pub fn redact(variant: &VariantSchema, payload: &WirePayload) -> WirePayload {
    payload
        .iter()
        .map(|(k, v)| {
            let secret = variant.field_by_wire(k).is_some_and(|f| f.is_secret());
            let v = if secret {
                Value::String(REDACTED.to_string())
            } else {
                v.clone()
            };
            (k.clone(), v)
        })
        .collect()
}
