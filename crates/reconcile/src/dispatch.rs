//! Variant selection for multi-shape resource families
//!
//! Families like metrics exporters or notification targets share one
//! logical type but expose each variant as its own sub-resource path. The
//! discriminator picks the variant; changing it is never an in-place update.

use crate::codec;
use crate::error::{Error, Result};
use crate::schema::{ResourceSchema, VariantSchema};
use crate::types::{DeclaredState, ObservedState, ResourceKey};
use serde_json::Value;

/// Select the variant a declaration targets
pub fn variant_for<'a>(
    schema: &'a ResourceSchema,
    declared: &DeclaredState,
) -> Result<&'a VariantSchema> {
    let Some(discriminator) = schema.discriminator else {
        return variant_named(schema, None);
    };
    match declared.value(discriminator) {
        Some(Value::String(name)) => variant_named(schema, Some(name)),
        Some(_) => Err(Error::invalid(discriminator, "discriminator must be a string")),
        None => Err(Error::MissingDiscriminator {
            kind: schema.kind.to_string(),
            field: discriminator.to_string(),
        }),
    }
}

/// Look a variant up by discriminator value
///
/// Single-variant families ignore `name`. Unknown values fail; there is no
/// generic fallback.
pub fn variant_named<'a>(
    schema: &'a ResourceSchema,
    name: Option<&str>,
) -> Result<&'a VariantSchema> {
    if schema.discriminator.is_none() {
        return schema.variants.first().ok_or_else(|| Error::UnsupportedVariant {
            kind: schema.kind.to_string(),
            variant: String::new(),
        });
    }
    let Some(name) = name else {
        return Err(Error::MissingDiscriminator {
            kind: schema.kind.to_string(),
            field: schema.discriminator.unwrap_or_default().to_string(),
        });
    };
    let wanted = name.trim().to_lowercase();
    schema
        .variants
        .iter()
        .find(|v| v.name == wanted)
        .ok_or_else(|| Error::UnsupportedVariant {
            kind: schema.kind.to_string(),
            variant: name.to_string(),
        })
}

/// Variant addressed by an existing key
pub fn variant_for_key<'a>(
    schema: &'a ResourceSchema,
    key: &ResourceKey,
) -> Result<&'a VariantSchema> {
    variant_named(schema, key.variant.as_deref())
}

/// Identity of the instance a declaration describes
pub fn key_for(
    schema: &ResourceSchema,
    variant: &VariantSchema,
    declared: &DeclaredState,
) -> Result<ResourceKey> {
    let name = codec::natural_key(variant, declared)?;
    Ok(match schema.discriminator {
        Some(_) => ResourceKey::with_variant(variant.name, name),
        None => ResourceKey::new(name),
    })
}

/// Check that `next` can be applied to `prior` in place
///
/// A different discriminator or natural key means a different remote object,
/// so both are reported as requiring replacement.
pub fn check_in_place<'a>(
    schema: &'a ResourceSchema,
    prior: &ObservedState,
    next: &DeclaredState,
) -> Result<&'a VariantSchema> {
    let current = variant_for_key(schema, &prior.key)?;
    let target = variant_for(schema, next)?;
    if current.name != target.name {
        return Err(Error::RequiresReplacement {
            field: schema.discriminator.unwrap_or("type").to_string(),
            from: current.name.to_string(),
            to: target.name.to_string(),
        });
    }
    if let Some(name) = next.value(target.key) {
        let name = codec::natural_key(target, next).unwrap_or_else(|_| name.to_string());
        if name != prior.key.name {
            return Err(Error::RequiresReplacement {
                field: target.key.to_string(),
                from: prior.key.name.clone(),
                to: name,
            });
        }
    }
    Ok(target)
}

/// Record the discriminator in a decoded snapshot
pub fn stamp(schema: &ResourceSchema, variant: &VariantSchema, observed: &mut ObservedState) {
    if let Some(discriminator) = schema.discriminator {
        observed.set(discriminator, Value::String(variant.name.to_string()));
    }
}

/// Parse an import identifier
///
/// `<variant>/<name>` for families with a discriminator, `<name>` otherwise.
pub fn parse_key(schema: &ResourceSchema, raw: &str) -> Result<ResourceKey> {
    let raw = raw.trim();
    let key = match schema.discriminator {
        Some(_) => {
            let (variant, name) = raw
                .split_once('/')
                .ok_or_else(|| Error::InvalidKey(raw.to_string()))?;
            let variant = variant_named(schema, Some(variant))?;
            ResourceKey::with_variant(variant.name, name.trim())
        }
        None => ResourceKey::new(raw),
    };
    if key.name.is_empty() || key.name.contains('/') {
        return Err(Error::InvalidKey(raw.to_string()));
    }
    Ok(key)
}
