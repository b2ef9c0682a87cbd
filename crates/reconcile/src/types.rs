//! Core types for declared and observed resource state

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Presence of a single declared field
///
/// Declarations distinguish "not configured" from "explicitly cleared" so
/// callers never have to encode presence through sentinel values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Field is not configured
    #[default]
    Absent,
    /// Field was explicitly set to null
    Null,
    /// Field carries a value
    Set(Value),
}

impl FieldValue {
    /// Check if the field carries a value
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Borrow the value, if any
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Set(v) => Some(v),
            Self::Absent | Self::Null => None,
        }
    }
}

impl From<Option<Value>> for FieldValue {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) => Self::Null,
            Some(v) => Self::Set(v),
            None => Self::Absent,
        }
    }
}

static ABSENT: FieldValue = FieldValue::Absent;

/// Desired configuration for one resource instance
///
/// Keys are logical field names (the stable, user-facing identifiers), never
/// wire names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredState {
    fields: BTreeMap<String, FieldValue>,
}

impl DeclaredState {
    /// Create an empty declaration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style explicit null
    pub fn with_null(mut self, name: &str) -> Self {
        self.clear(name);
        self
    }

    /// Set a field to a value
    ///
    /// A JSON `null` is recorded as an explicit clear.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let field = if value.is_null() {
            FieldValue::Null
        } else {
            FieldValue::Set(value)
        };
        self.fields.insert(name.to_string(), field);
    }

    /// Mark a field as explicitly cleared
    pub fn clear(&mut self, name: &str) {
        self.fields.insert(name.to_string(), FieldValue::Null);
    }

    /// Forget a field entirely
    pub fn unset(&mut self, name: &str) {
        self.fields.remove(name);
    }

    /// Presence of a field
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&ABSENT)
    }

    /// Value of a field, if set
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).as_value()
    }

    /// String value of a field, if set and a string
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Check if a field carries a value
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_set()
    }

    /// Iterate over every recorded field (absent fields are not recorded)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a declaration from a JSON object
    ///
    /// Returns `None` if `value` is not an object.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => {
                let fields = map
                    .into_iter()
                    .map(|(k, v)| (k, FieldValue::from(Some(v))))
                    .collect();
                Some(Self { fields })
            }
            _ => None,
        }
    }
}

/// Opaque optimistic-concurrency marker (the remote "digest")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a token string
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a resource instance
///
/// `variant` is set for families with sub-variants, since each variant is a
/// distinct sub-resource path on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Discriminator value, for families with sub-variants
    pub variant: Option<String>,
    /// Natural key (name or id), immutable after creation
    pub name: String,
}

impl ResourceKey {
    /// Key for a family without sub-variants
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            variant: None,
            name: name.into(),
        }
    }

    /// Key for a specific sub-variant
    pub fn with_variant(variant: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            variant: Some(variant.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}", variant, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Last state read back from the remote system
///
/// Fields the remote never echoes are either carried forward from the
/// declaration or listed in `unknown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedState {
    /// Identity of the instance
    pub key: ResourceKey,
    /// Logical field values
    pub fields: BTreeMap<String, Value>,
    /// Write-only fields whose remote value cannot be known
    pub unknown: BTreeSet<String>,
    /// Version token from the most recent read
    pub version: Option<VersionToken>,
}

impl ObservedState {
    /// Create an empty snapshot for `key`
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
            unknown: BTreeSet::new(),
            version: None,
        }
    }

    /// Value of a field
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String value of a field
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Whether a write-only field is unknown
    pub fn is_unknown(&self, name: &str) -> bool {
        self.unknown.contains(name)
    }

    /// Record a known field value
    pub fn set(&mut self, name: &str, value: Value) {
        self.unknown.remove(name);
        self.fields.insert(name.to_string(), value);
    }

    /// Mark a field as unknown
    pub fn mark_unknown(&mut self, name: &str) {
        self.fields.remove(name);
        self.unknown.insert(name.to_string());
    }

    /// View the known fields as a declaration
    ///
    /// Used as the baseline side of delta computation.
    pub fn as_declared(&self) -> DeclaredState {
        let mut declared = DeclaredState::new();
        for (name, value) in &self.fields {
            declared.set(name, value.clone());
        }
        declared
    }
}
