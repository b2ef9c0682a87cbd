//! Field codec: declared shape <-> wire shape
//!
//! Declarations use logical field names and may still carry legacy fields
//! from older schema versions. The codec resolves those into the canonical
//! fields of the selected variant, coerces values to the field's type and
//! renders them with the wire names. Decoding runs the other way and splits
//! canonical fields back into their legacy parts so older declarations keep
//! matching what was read.

use crate::error::{Error, Result};
use crate::guard;
use crate::propstring;
use crate::schema::{FieldSpec, FieldType, LegacyRule, SubField, SubType, VariantSchema};
use crate::types::{DeclaredState, ObservedState, ResourceKey};
use log::{trace, warn};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// JSON object sent to or received from the remote API
pub type WirePayload = Map<String, Value>;

/// Canonical logical values of the writable fields of one variant
///
/// Values are normalized to the field's type; fields without a value
/// (absent, null, or empty) are not present.
pub type Resolved = BTreeMap<&'static str, Value>;

/// Resolve a declaration into canonical, normalized field values
///
/// Legacy rules run first: a canonical field that is set wins, otherwise it
/// is synthesized from its legacy parts. Field defaults fill the gaps.
pub fn resolve(variant: &VariantSchema, declared: &DeclaredState) -> Result<Resolved> {
    let mut synthesized: BTreeMap<&'static str, Value> = BTreeMap::new();
    for rule in variant.legacy {
        let canonical = rule.canonical();
        if declared.is_set(canonical) {
            continue;
        }
        if let Some(value) = synthesize(variant, rule, declared)? {
            synthesized.insert(canonical, value);
        }
    }

    let mut resolved = Resolved::new();
    for field in variant.fields.iter().filter(|f| f.is_writable()) {
        let raw = declared
            .value(field.name)
            .or_else(|| synthesized.get(field.name));
        let value = match raw {
            Some(raw) => normalize(field, raw)?,
            None => None,
        };
        let value = value.or_else(|| {
            if field.is_write_only() {
                None
            } else {
                field.default_value()
            }
        });
        if let Some(value) = value {
            resolved.insert(field.name, value);
        }
    }
    Ok(resolved)
}

/// Encode a declaration into a creation payload
///
/// Includes the natural key and every writable field that resolves to a
/// value. Fails before any remote call if a required field is missing.
pub fn encode(variant: &VariantSchema, declared: &DeclaredState) -> Result<WirePayload> {
    let key = natural_key(variant, declared)?;
    let resolved = resolve(variant, declared)?;

    for field in variant.fields.iter().filter(|f| f.required && f.is_writable()) {
        if !resolved.contains_key(field.name) {
            return Err(Error::missing(field.name));
        }
    }

    let mut payload = WirePayload::new();
    payload.insert(variant.key.to_string(), Value::String(key));
    for field in variant.fields {
        if let Some(value) = resolved.get(field.name) {
            payload.insert(field.wire.to_string(), to_wire(field, value));
        }
    }
    Ok(payload)
}

/// Decode a wire object into an observed snapshot
///
/// Read defaults are applied to readable fields the remote omitted, and
/// canonical fields are split back into their legacy parts. Write-only
/// fields are left alone; see [`crate::secrets::retain_secrets`].
pub fn decode(variant: &VariantSchema, key: ResourceKey, wire: &WirePayload) -> ObservedState {
    let mut observed = ObservedState::new(key);
    observed.version = guard::extract(wire);

    let name = observed.key.name.clone();
    observed.set(variant.key, Value::String(name));

    for field in variant.fields {
        let value = wire
            .get(field.wire)
            .and_then(|raw| from_wire(field, raw))
            .or_else(|| {
                if field.is_write_only() {
                    None
                } else {
                    field.default_value()
                }
            });
        if let Some(value) = value {
            observed.set(field.name, value);
        }
    }

    for wire_name in wire.keys() {
        let known = wire_name == variant.key
            || wire_name == guard::DIGEST
            || variant.field_by_wire(wire_name).is_some();
        if !known {
            trace!("ignoring wire field '{}' on {}", wire_name, variant.name);
        }
    }

    for rule in variant.legacy {
        split_legacy(rule, &mut observed);
    }
    observed
}

/// Natural key from a declaration
pub fn natural_key(variant: &VariantSchema, declared: &DeclaredState) -> Result<String> {
    match declared.value(variant.key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(Error::invalid(variant.key, "natural key must be a string")),
        None => Err(Error::missing(variant.key)),
    }
}

/// Coerce a declared value to the field's type
///
/// Returns `None` for values that carry nothing (empty lists and empty
/// composites), which are treated like an absent field.
pub fn normalize(field: &FieldSpec, value: &Value) -> Result<Option<Value>> {
    let normalized = match field.ty {
        FieldType::String => Some(Value::String(as_string(field.name, value)?)),
        FieldType::Integer => Some(Value::Number(as_integer(field.name, value)?)),
        FieldType::Boolean => Some(Value::Bool(as_bool(field.name, value)?)),
        FieldType::List => {
            let items = match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| as_string(field.name, item).map(Value::String))
                    .collect::<Result<Vec<_>>>()?,
                Value::Null => Vec::new(),
                scalar => vec![Value::String(as_string(field.name, scalar)?)],
            };
            (!items.is_empty()).then_some(Value::Array(items))
        }
        FieldType::Composite(members) => {
            let object = match value {
                Value::Object(map) => normalize_members(field.name, members, map)?,
                Value::String(raw) => parse_composite(members, raw),
                _ => {
                    return Err(Error::invalid(
                        field.name,
                        "expected an object or a property string",
                    ));
                }
            };
            (!object.is_empty()).then_some(Value::Object(object))
        }
    };
    Ok(normalized)
}

/// Render a normalized value in its wire form
pub fn to_wire(field: &FieldSpec, value: &Value) -> Value {
    match (field.ty, value) {
        (FieldType::Composite(members), Value::Object(object)) => {
            let mut entries = BTreeMap::new();
            for member in members {
                if let Some(v) = object.get(member.name) {
                    entries.insert(member.wire.to_string(), member_to_string(member, v));
                }
            }
            Value::String(propstring::format(&entries))
        }
        _ => value.clone(),
    }
}

/// Read a wire value into its normalized logical form
///
/// Decoding is tolerant: a value that does not fit the field's type is kept
/// as-is with a warning rather than failing the whole read.
pub fn from_wire(field: &FieldSpec, raw: &Value) -> Option<Value> {
    if raw.is_null() {
        return None;
    }
    match normalize(field, raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("keeping unexpected wire value for '{}': {}", field.wire, e);
            Some(raw.clone())
        }
    }
}

/// Compose `scheme://host:port`, defaulting the port from the scheme
///
/// 443 for `https`, 80 otherwise. IPv6 literals are bracketed.
pub fn compose_url(scheme: &str, host: &str, port: Option<u16>) -> Result<String> {
    let scheme = scheme.trim().to_lowercase();
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
        return Err(Error::invalid("scheme", format!("invalid scheme '{scheme}'")));
    }
    let port = port.unwrap_or(if scheme == "https" { 443 } else { 80 });
    Ok(format!("{}://{}:{}", scheme, host_literal(host)?, port))
}

/// Split a URL into scheme, host and optional port
///
/// The port is only reported when the URL spells it out; a missing port is
/// not an error.
pub fn split_url(raw: &str) -> Option<(String, String, Option<u16>)> {
    let (scheme, rest) = raw.trim().split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    let (host, port) = split_host_port(authority)?;
    Some((scheme.to_lowercase(), host, port))
}

/// Compose `host:port`; IPv6 literals are bracketed
pub fn compose_host_port(host: &str, port: u16) -> Result<String> {
    Ok(format!("{}:{}", host_literal(host)?, port))
}

/// Split `host[:port]`, accepting bracketed IPv6 literals
pub fn split_host_port(raw: &str) -> Option<(String, Option<u16>)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = match after.strip_prefix(':') {
            Some(p) => Some(p.parse().ok()?),
            None if after.is_empty() => None,
            None => return None,
        };
        return Some((host.to_string(), port));
    }
    match raw.rsplit_once(':') {
        // a bare IPv6 address has several colons and no port
        Some((host, _)) if host.contains(':') => Some((raw.to_string(), None)),
        Some((host, port)) => Some((host.to_string(), Some(port.parse().ok()?))),
        None => Some((raw.to_string(), None)),
    }
}

fn host_literal(host: &str) -> Result<String> {
    let host = host.trim();
    let bracketed = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    // validated only; the declared spelling is what goes on the wire
    url::Host::parse(&bracketed)
        .map(|_| bracketed)
        .map_err(|e| Error::invalid("host", format!("invalid host '{host}': {e}")))
}

fn synthesize(
    variant: &VariantSchema,
    rule: &LegacyRule,
    declared: &DeclaredState,
) -> Result<Option<Value>> {
    match *rule {
        LegacyRule::Rename { legacy, .. } => Ok(declared.value(legacy).cloned()),
        LegacyRule::ComposeUrl {
            canonical,
            host,
            port,
            scheme,
            default_scheme,
        } => {
            let Some(host_value) = declared.value(host) else {
                return insufficient(variant, canonical, declared, &[port, scheme]);
            };
            let host_value = as_string(host, host_value)?;
            let port_value = declared.value(port).map(|p| as_port(port, p)).transpose()?;
            let scheme_value = match declared.value(scheme) {
                Some(s) => as_string(scheme, s)?,
                None => default_scheme.to_string(),
            };
            compose_url(&scheme_value, &host_value, port_value)
                .map(|url| Some(Value::String(url)))
        }
        LegacyRule::ComposeHostPort {
            canonical,
            host,
            port,
        } => {
            let (Some(host_value), Some(port_value)) = (declared.value(host), declared.value(port))
            else {
                return insufficient(variant, canonical, declared, &[host, port]);
            };
            let host_value = as_string(host, host_value)?;
            let port_value = as_port(port, port_value)?;
            compose_host_port(&host_value, port_value).map(|hp| Some(Value::String(hp)))
        }
    }
}

/// Legacy parts were declared but not enough of them to build the canonical
/// field, or the canonical field is required and nothing was declared.
fn insufficient(
    variant: &VariantSchema,
    canonical: &'static str,
    declared: &DeclaredState,
    parts: &[&str],
) -> Result<Option<Value>> {
    let required = variant.field(canonical).is_some_and(|f| f.required);
    let partial = parts.iter().any(|p| declared.is_set(p));
    if required || partial {
        Err(Error::missing(canonical))
    } else {
        Ok(None)
    }
}

fn split_legacy(rule: &LegacyRule, observed: &mut ObservedState) {
    match *rule {
        LegacyRule::Rename { legacy, canonical } => {
            if let Some(value) = observed.value(canonical).cloned() {
                observed.set(legacy, value);
            }
        }
        LegacyRule::ComposeUrl {
            canonical,
            host,
            port,
            scheme,
            ..
        } => {
            let Some(raw) = observed.str(canonical).map(str::to_string) else {
                return;
            };
            match split_url(&raw) {
                Some((s, h, p)) => {
                    observed.set(scheme, Value::String(s));
                    observed.set(host, Value::String(h));
                    if let Some(p) = p {
                        observed.set(port, Value::from(p));
                    }
                }
                None => warn!("cannot split '{}' into host and port", canonical),
            }
        }
        LegacyRule::ComposeHostPort {
            canonical,
            host,
            port,
        } => {
            let Some(raw) = observed.str(canonical).map(str::to_string) else {
                return;
            };
            match split_host_port(&raw) {
                Some((h, p)) => {
                    observed.set(host, Value::String(h));
                    if let Some(p) = p {
                        observed.set(port, Value::from(p));
                    }
                }
                None => warn!("cannot split '{}' into host and port", canonical),
            }
        }
    }
}

fn normalize_members(
    field: &str,
    members: &[SubField],
    map: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut object = Map::new();
    for (name, value) in map {
        let member = members
            .iter()
            .find(|m| m.name == name || m.wire == name)
            .ok_or_else(|| Error::invalid(field, format!("unknown member '{name}'")))?;
        if value.is_null() {
            continue;
        }
        let value = match member.ty {
            SubType::String => Value::String(as_string(member.name, value)?),
            SubType::Integer => Value::Number(as_integer(member.name, value)?),
            SubType::Boolean => Value::Bool(as_bool(member.name, value)?),
        };
        if value.as_str().is_some_and(str::is_empty) {
            continue;
        }
        object.insert(member.name.to_string(), value);
    }
    Ok(object)
}

fn parse_composite(members: &[SubField], raw: &str) -> Map<String, Value> {
    let mut object = Map::new();
    for (key, value) in propstring::parse(raw) {
        let Some(member) = members.iter().find(|m| m.wire == key) else {
            trace!("ignoring property '{}'", key);
            continue;
        };
        let raw_value = Value::String(value.clone());
        let typed = match member.ty {
            SubType::String => Some(raw_value),
            SubType::Integer => as_integer(member.name, &raw_value).ok().map(Value::Number),
            SubType::Boolean => as_bool(member.name, &raw_value).ok().map(Value::Bool),
        };
        match typed {
            Some(v) if !value.is_empty() => {
                object.insert(member.name.to_string(), v);
            }
            Some(_) => {}
            None => warn!("ignoring malformed property {}={}", key, value),
        }
    }
    object
}

fn member_to_string(member: &SubField, value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) if member.ty == SubType::Boolean => "1".to_string(),
        Value::Bool(false) if member.ty == SubType::Boolean => "0".to_string(),
        other => other.to_string(),
    }
}

fn as_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::invalid(field, "expected a string")),
    }
}

fn as_integer(field: &str, value: &Value) -> Result<Number> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(Number::from)
        .ok_or_else(|| Error::invalid(field, "expected an integer"))
}

fn as_bool(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::invalid(field, format!("expected a boolean, got '{s}'"))),
        },
        _ => Err(Error::invalid(field, "expected a boolean")),
    }
}

fn as_port(field: &str, value: &Value) -> Result<u16> {
    let n = as_integer(field, value)?;
    n.as_i64()
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| Error::invalid(field, "port must be between 1 and 65535"))
}
