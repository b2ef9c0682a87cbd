//! Schema metadata for resource families
//!
//! Resource kinds are described by data tables instead of per-kind code:
//! a family has one or more variants, each variant lists its fields and the
//! legacy alias rules that keep older declarations working.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Manageable entity families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Datastore,
    Remote,
    MetricsExporter,
    NotificationTarget,
    NotificationMatcher,
    Job,
    S3Endpoint,
}

impl ResourceKind {
    /// All kinds, in catalog order
    pub const ALL: [ResourceKind; 7] = [
        Self::Datastore,
        Self::Remote,
        Self::MetricsExporter,
        Self::NotificationTarget,
        Self::NotificationMatcher,
        Self::Job,
        Self::S3Endpoint,
    ];

    /// Stable identifier of the kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Datastore => "datastore",
            Self::Remote => "remote",
            Self::MetricsExporter => "metrics_exporter",
            Self::NotificationTarget => "notification_target",
            Self::NotificationMatcher => "notification_matcher",
            Self::Job => "job",
            Self::S3Endpoint => "s3_endpoint",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a composite sub-field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubType {
    String,
    Integer,
    Boolean,
}

/// Named member of a composite field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubField {
    /// Logical name
    pub name: &'static str,
    /// Key inside the property string
    pub wire: &'static str,
    /// Value type
    pub ty: SubType,
}

impl SubField {
    pub const fn string(name: &'static str, wire: &'static str) -> Self {
        Self {
            name,
            wire,
            ty: SubType::String,
        }
    }

    pub const fn integer(name: &'static str, wire: &'static str) -> Self {
        Self {
            name,
            wire,
            ty: SubType::Integer,
        }
    }

    pub const fn boolean(name: &'static str, wire: &'static str) -> Self {
        Self {
            name,
            wire,
            ty: SubType::Boolean,
        }
    }
}

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// Array of strings; a bare string is accepted and wrapped
    List,
    /// Small object encoded as a property string, diffed atomically
    Composite(&'static [SubField]),
}

/// Which operations may write a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Written on create and update
    ReadWrite,
    /// Written on create only; a change requires replacement
    CreateOnly,
    /// Reported by the remote, never written
    ReadOnly,
}

/// Whether the remote echoes a field back on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Readable,
    /// Accepted on write, never returned
    WriteOnly,
    /// Write-only and redacted from logs
    Secret,
}

/// Per-field default, applied when a side omits the field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl FieldDefault {
    pub fn to_value(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::Str(s) => Value::from(s),
        }
    }
}

/// Metadata for one field of a resource variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Logical, user-facing name
    pub name: &'static str,
    /// Name on the wire (kebab-case)
    pub wire: &'static str,
    pub ty: FieldType,
    /// Must be present to create, and may not be cleared
    pub required: bool,
    /// Omission on update is illegal: resent with every update
    pub always_send: bool,
    pub access: Access,
    pub visibility: Visibility,
    pub default: Option<FieldDefault>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, wire: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            wire,
            ty,
            required: false,
            always_send: false,
            access: Access::ReadWrite,
            visibility: Visibility::Readable,
            default: None,
        }
    }

    pub const fn string(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::String)
    }

    pub const fn integer(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::Integer)
    }

    pub const fn boolean(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::Boolean)
    }

    pub const fn list(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::List)
    }

    pub const fn composite(
        name: &'static str,
        wire: &'static str,
        members: &'static [SubField],
    ) -> Self {
        Self::new(name, wire, FieldType::Composite(members))
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn always_send(self) -> Self {
        Self {
            always_send: true,
            ..self
        }
    }

    pub const fn create_only(self) -> Self {
        Self {
            access: Access::CreateOnly,
            ..self
        }
    }

    pub const fn read_only(self) -> Self {
        Self {
            access: Access::ReadOnly,
            ..self
        }
    }

    pub const fn write_only(self) -> Self {
        Self {
            visibility: Visibility::WriteOnly,
            ..self
        }
    }

    pub const fn secret(self) -> Self {
        Self {
            visibility: Visibility::Secret,
            ..self
        }
    }

    pub const fn default(self, default: FieldDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    /// Whether any operation writes this field
    pub fn is_writable(&self) -> bool {
        self.access != Access::ReadOnly
    }

    /// Whether the remote omits this field on read
    pub fn is_write_only(&self) -> bool {
        self.visibility != Visibility::Readable
    }

    pub fn is_secret(&self) -> bool {
        self.visibility == Visibility::Secret
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default.map(FieldDefault::to_value)
    }
}

/// Backwards-compatibility rule between declared and wire shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyRule {
    /// A field that was renamed; the legacy name is still accepted
    Rename {
        legacy: &'static str,
        canonical: &'static str,
    },
    /// `scheme://host:port` consolidated from separate fields
    ComposeUrl {
        canonical: &'static str,
        host: &'static str,
        port: &'static str,
        scheme: &'static str,
        default_scheme: &'static str,
    },
    /// `host:port` consolidated from separate fields
    ComposeHostPort {
        canonical: &'static str,
        host: &'static str,
        port: &'static str,
    },
}

impl LegacyRule {
    /// Logical name of the field this rule produces
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::Rename { canonical, .. }
            | Self::ComposeUrl { canonical, .. }
            | Self::ComposeHostPort { canonical, .. } => canonical,
        }
    }

    /// Logical names of the legacy inputs
    pub fn legacy_fields(&self) -> Vec<&'static str> {
        match self {
            Self::Rename { legacy, .. } => vec![legacy],
            Self::ComposeUrl {
                host, port, scheme, ..
            } => vec![host, port, scheme],
            Self::ComposeHostPort { host, port, .. } => vec![host, port],
        }
    }
}

/// One structural variant of a resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSchema {
    /// Discriminator value (or the kind name for single-variant families)
    pub name: &'static str,
    /// API collection path, e.g. `/config/metrics/influxdb-http`
    pub collection: &'static str,
    /// Logical and wire name of the natural key
    pub key: &'static str,
    pub fields: &'static [FieldSpec],
    pub legacy: &'static [LegacyRule],
}

impl VariantSchema {
    /// Look up a field by logical name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up a field by wire name
    pub fn field_by_wire(&self, wire: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.wire == wire)
    }

    /// Collection path split into segments
    pub fn collection_segments(&self) -> impl Iterator<Item = &'static str> {
        self.collection.split('/').filter(|s| !s.is_empty())
    }

    /// Check the table for duplicate names
    ///
    /// Two fields sharing a wire name could be set and cleared in the same
    /// pass, so that is rejected up front.
    pub fn validate(&self) -> Result<()> {
        let mut logical = BTreeSet::new();
        let mut wire = BTreeSet::new();
        for field in self.fields {
            if !logical.insert(field.name) || field.name == self.key {
                return Err(Error::invalid(field.name, "duplicate logical field name"));
            }
            if !wire.insert(field.wire) || field.wire == self.key {
                return Err(Error::ContradictoryDelta {
                    field: field.wire.to_string(),
                });
            }
        }
        for rule in self.legacy {
            if self.field(rule.canonical()).is_none() {
                return Err(Error::invalid(
                    rule.canonical(),
                    "legacy rule targets an unknown field",
                ));
            }
            for legacy in rule.legacy_fields() {
                if self.field(legacy).is_some() {
                    return Err(Error::invalid(legacy, "legacy alias shadows a wire field"));
                }
            }
        }
        Ok(())
    }
}

/// A resource family: one logical type, one or more variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSchema {
    pub kind: ResourceKind,
    /// Logical name of the discriminator, for multi-variant families
    pub discriminator: Option<&'static str>,
    pub variants: &'static [VariantSchema],
}
