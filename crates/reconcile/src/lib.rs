//! # reconcile
//!
//! Declared-vs-observed reconciliation core for REST-managed configuration
//! objects.
//!
//! This crate holds the pure half of a provider: everything between "what
//! the user declared" and "the request body the remote expects". It performs
//! no I/O and keeps no state, so one schema table can serve any number of
//! concurrent reconciliations.
//!
//! ## Components
//!
//! - [`schema`] - per-kind field tables and legacy alias rules
//! - [`codec`] - declared shape <-> wire shape, including legacy fields
//! - [`propstring`] - `key=value,...` encoding for composite fields
//! - [`delta`] - minimal write-set plus removal list for updates
//! - [`guard`] - version token placement
//! - [`secrets`] - carrying write-only fields across reads
//! - [`dispatch`] - variant selection by discriminator
//!
//! ## Example
//!
//! ```
//! use reconcile::{DeclaredState, ObservedState, ResourceKey};
//! use reconcile::schema::{FieldSpec, VariantSchema};
//!
//! const FIELDS: &[FieldSpec] = &[FieldSpec::string("comment", "comment")];
//! const REMOTE: VariantSchema = VariantSchema {
//!     name: "remote",
//!     collection: "/config/remote",
//!     key: "name",
//!     fields: FIELDS,
//!     legacy: &[],
//! };
//!
//! let mut prior = ObservedState::new(ResourceKey::new("r1"));
//! prior.set("comment", "old".into());
//!
//! let next = DeclaredState::new().with("name", "r1");
//! let delta = reconcile::delta::compute(&REMOTE, &prior, &next).unwrap();
//! assert!(delta.clear.contains("comment"));
//! ```

pub mod codec;
pub mod delta;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod propstring;
pub mod schema;
pub mod secrets;
pub mod types;

pub use codec::WirePayload;
pub use delta::FieldDelta;
pub use error::{Error, ErrorCategory, Result};
pub use schema::{ResourceKind, ResourceSchema, VariantSchema};
pub use types::{DeclaredState, FieldValue, ObservedState, ResourceKey, VersionToken};
