//! Create/read/update/delete/import/list for resource instances
//!
//! A [`ResourceHandle`] binds one schema table to the remote API. All state
//! lives in the caller's snapshots: operations borrow the prior snapshot and
//! return a fresh one, so a failed write leaves the caller's state intact.

use log::{debug, info, warn};
use pbskit::{Api, ApiError, ApiPath, CancelToken};
use reconcile::schema::VariantSchema;
use reconcile::{
    DeclaredState, ObservedState, ResourceKey, ResourceKind, ResourceSchema, VersionToken, codec,
    delta, dispatch, guard, secrets,
};
use serde_json::Value;

use crate::error::{Error, ErrorKind, Operation, Result};
use crate::resource;

/// Entry point for reconciling server configuration
pub struct Reconciler<A: Api> {
    api: A,
    cancel: CancelToken,
}

impl<A: Api> Reconciler<A> {
    pub fn new(api: A) -> Self {
        Self::with_cancel(api, CancelToken::new())
    }

    /// Create a reconciler that observes an existing cancellation flag
    pub fn with_cancel(api: A, cancel: CancelToken) -> Self {
        Self { api, cancel }
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Operations on one resource family
    pub fn resource(&self, kind: ResourceKind) -> ResourceHandle<'_, A> {
        ResourceHandle {
            reconciler: self,
            schema: resource::schema(kind),
        }
    }

    /// Run one remote call unless cancellation was requested
    ///
    /// `sent` lists the wire fields of the request body. A call already
    /// issued runs to completion, so a write the server applied is never
    /// reported as cancelled.
    fn call<T>(
        &self,
        sent: &[&str],
        f: impl FnOnce(&A) -> pbskit::Result<T>,
    ) -> std::result::Result<T, ErrorKind> {
        self.cancel.check()?;
        f(&self.api).map_err(|e| ErrorKind::from_api(e, sent))
    }

    /// Run the read-back that completes an applied write
    fn call_committed<T>(
        &self,
        f: impl FnOnce(&A) -> pbskit::Result<T>,
    ) -> std::result::Result<T, ErrorKind> {
        f(&self.api).map_err(ErrorKind::from)
    }
}

/// Operations bound to one resource family
pub struct ResourceHandle<'a, A: Api> {
    reconciler: &'a Reconciler<A>,
    schema: &'static ResourceSchema,
}

impl<A: Api> ResourceHandle<'_, A> {
    pub fn schema(&self) -> &'static ResourceSchema {
        self.schema
    }

    pub fn kind(&self) -> ResourceKind {
        self.schema.kind
    }

    /// Create the object described by `declared`
    ///
    /// Missing required fields fail before any request is made. The result
    /// is read back so it carries the server's version token.
    pub fn create(&self, declared: &DeclaredState) -> Result<ObservedState> {
        let op = Operation::Create;
        let label = self.label(declared);
        let fail = |kind: ErrorKind| Error::new(self.kind(), label.clone(), op, kind);

        let variant = dispatch::variant_for(self.schema, declared).map_err(|e| fail(e.into()))?;
        let key = dispatch::key_for(self.schema, variant, declared).map_err(|e| fail(e.into()))?;
        let payload = codec::encode(variant, declared).map_err(|e| fail(e.into()))?;

        debug!(
            "create {} '{}': {}",
            self.kind(),
            key,
            Value::Object(secrets::redact(variant, &payload))
        );
        let sent: Vec<&str> = payload.keys().map(String::as_str).collect();
        let body = Value::Object(payload.clone());
        let path = collection_path(variant);
        self.reconciler
            .call(&sent, |api| api.post(&path, &body))
            .map_err(|e| fail(schema_field(variant, e)))?;
        info!("created {} '{}'", self.kind(), key);

        self.read_back(variant, &key, declared).map_err(fail)
    }

    /// Read the current state of `key`
    ///
    /// `declared` is the last known declaration; write-only fields are
    /// carried forward from it. Without one they are marked unknown.
    pub fn read(
        &self,
        key: &ResourceKey,
        declared: Option<&DeclaredState>,
    ) -> Result<ObservedState> {
        let fail = |kind: ErrorKind| Error::new(self.kind(), key.to_string(), Operation::Read, kind);
        let variant = dispatch::variant_for_key(self.schema, key).map_err(|e| fail(e.into()))?;
        self.fetch(variant, key, declared).map_err(fail)
    }

    /// Apply `next` to the object `prior` was read from
    ///
    /// Only changed fields are sent, together with the removal list and the
    /// prior version token. An empty delta makes no request and returns the
    /// prior snapshot unchanged.
    pub fn update(
        &self,
        key: &ResourceKey,
        prior: &ObservedState,
        next: &DeclaredState,
    ) -> Result<ObservedState> {
        let fail =
            |kind: ErrorKind| Error::new(self.kind(), key.to_string(), Operation::Update, kind);

        let variant =
            dispatch::check_in_place(self.schema, prior, next).map_err(|e| fail(e.into()))?;
        let delta = delta::compute(variant, prior, next).map_err(|e| fail(e.into()))?;
        if delta.is_empty() {
            debug!("{} '{}' is up to date", self.kind(), key);
            return Ok(prior.clone());
        }

        let mut body = delta.to_body();
        guard::attach(&mut body, prior.version.as_ref());
        debug!(
            "update {} '{}': {}",
            self.kind(),
            key,
            Value::Object(secrets::redact(variant, &body))
        );

        let sent: Vec<&str> = delta.set.keys().map(String::as_str).collect();
        let path = item_path(variant, &key.name);
        let body = Value::Object(body);
        self.reconciler
            .call(&sent, |api| api.put(&path, &body))
            .map_err(|e| fail(schema_field(variant, e)))?;
        info!(
            "updated {} '{}' ({} set, {} cleared)",
            self.kind(),
            key,
            delta.set.len(),
            delta.clear.len()
        );

        self.read_back(variant, key, next).map_err(fail)
    }

    /// Delete `key`, guarded by `version` when one is known
    ///
    /// An object that no longer exists counts as deleted.
    pub fn delete(&self, key: &ResourceKey, version: Option<&VersionToken>) -> Result<()> {
        let fail =
            |kind: ErrorKind| Error::new(self.kind(), key.to_string(), Operation::Delete, kind);
        let variant = dispatch::variant_for_key(self.schema, key).map_err(|e| fail(e.into()))?;

        let mut path = item_path(variant, &key.name);
        if let Some((name, value)) = guard::query(version) {
            path = path.with_query(name, value);
        }
        match self.reconciler.call(&[], |api| api.delete(&path)) {
            Ok(_) => info!("deleted {} '{}'", self.kind(), key),
            Err(ErrorKind::NotFound { .. }) => {
                warn!("{} '{}' already deleted", self.kind(), key);
            }
            Err(e) => return Err(fail(e)),
        }
        Ok(())
    }

    /// Adopt an existing object by identifier
    ///
    /// Identifiers are `<variant>/<name>` for families with a discriminator
    /// and `<name>` otherwise. Write-only fields come back unknown.
    pub fn import(&self, id: &str) -> Result<ObservedState> {
        let fail = |kind: ErrorKind| Error::new(self.kind(), id, Operation::Import, kind);
        let key = dispatch::parse_key(self.schema, id).map_err(|e| fail(e.into()))?;
        let variant = dispatch::variant_for_key(self.schema, &key).map_err(|e| fail(e.into()))?;
        let observed = self.fetch(variant, &key, None).map_err(fail)?;
        info!("imported {} '{}'", self.kind(), observed.key);
        Ok(observed)
    }

    /// Read every object of the family
    ///
    /// `variant` limits the listing to one discriminator value; `None` lists
    /// all variants. Write-only fields come back unknown and legacy fields
    /// are split out as on a single read.
    pub fn list(&self, variant: Option<&str>) -> Result<Vec<ObservedState>> {
        let label = variant.unwrap_or("*");
        let fail = |kind: ErrorKind| Error::new(self.kind(), label, Operation::List, kind);
        let variants: Vec<&VariantSchema> = match variant {
            Some(name) => {
                vec![dispatch::variant_named(self.schema, Some(name)).map_err(|e| fail(e.into()))?]
            }
            None => self.schema.variants.iter().collect(),
        };

        let mut listed = Vec::new();
        for variant in variants {
            let path = collection_path(variant);
            let data = self
                .reconciler
                .call(&[], |api| api.get(&path))
                .map_err(fail)?;
            let items = match data {
                Value::Array(items) => items,
                other => {
                    return Err(fail(ErrorKind::Transport(ApiError::InvalidResponse(
                        format!("expected a list for {path}, got {other}"),
                    ))));
                }
            };
            for item in items {
                let Value::Object(wire) = item else {
                    warn!("skipping non-object entry in {path}");
                    continue;
                };
                match wire.get(variant.key).and_then(Value::as_str) {
                    Some(name) => listed.push(self.decode_item(variant, name, None, &wire)),
                    None => warn!("skipping entry without '{}' in {path}", variant.key),
                }
            }
        }
        debug!("listed {} {} objects", listed.len(), self.kind());
        Ok(listed)
    }

    fn fetch(
        &self,
        variant: &VariantSchema,
        key: &ResourceKey,
        declared: Option<&DeclaredState>,
    ) -> std::result::Result<ObservedState, ErrorKind> {
        let path = item_path(variant, &key.name);
        let data = self.reconciler.call(&[], |api| api.get(&path))?;
        self.observe(variant, key, declared, data)
    }

    /// Read the object a write just applied
    ///
    /// Cancellation is not checked: the write already happened and the
    /// caller needs the snapshot to record it.
    fn read_back(
        &self,
        variant: &VariantSchema,
        key: &ResourceKey,
        declared: &DeclaredState,
    ) -> std::result::Result<ObservedState, ErrorKind> {
        let path = item_path(variant, &key.name);
        let data = self.reconciler.call_committed(|api| api.get(&path))?;
        self.observe(variant, key, Some(declared), data)
    }

    fn observe(
        &self,
        variant: &VariantSchema,
        key: &ResourceKey,
        declared: Option<&DeclaredState>,
        data: Value,
    ) -> std::result::Result<ObservedState, ErrorKind> {
        let wire = match data {
            Value::Object(wire) => wire,
            other => {
                return Err(ErrorKind::Transport(ApiError::InvalidResponse(format!(
                    "expected an object for {} '{key}', got {other}",
                    self.kind()
                ))));
            }
        };
        Ok(self.decode_item(variant, &key.name, declared, &wire))
    }

    fn decode_item(
        &self,
        variant: &VariantSchema,
        name: &str,
        declared: Option<&DeclaredState>,
        wire: &serde_json::Map<String, Value>,
    ) -> ObservedState {
        let key = match self.schema.discriminator {
            Some(_) => ResourceKey::with_variant(variant.name, name),
            None => ResourceKey::new(name),
        };
        let mut observed = codec::decode(variant, key, wire);
        dispatch::stamp(self.schema, variant, &mut observed);
        secrets::retain_secrets(variant, &mut observed, declared);
        observed
    }

    /// Best-effort identifier for errors raised before the key is known
    fn label(&self, declared: &DeclaredState) -> String {
        dispatch::variant_for(self.schema, declared)
            .and_then(|variant| dispatch::key_for(self.schema, variant, declared))
            .map_or_else(|_| "<unnamed>".to_string(), |key| key.to_string())
    }
}

fn collection_path(variant: &VariantSchema) -> ApiPath {
    variant
        .collection_segments()
        .fold(ApiPath::default(), |path, segment| path.join(segment))
}

fn item_path(variant: &VariantSchema, name: &str) -> ApiPath {
    collection_path(variant).join(name)
}

/// Report a rejected field by its logical name
fn schema_field(variant: &VariantSchema, kind: ErrorKind) -> ErrorKind {
    match kind {
        ErrorKind::SchemaIncompatible { field, message } => ErrorKind::SchemaIncompatible {
            field: variant
                .field_by_wire(&field)
                .map_or(field.clone(), |f| f.name.to_string()),
            message,
        },
        other => other,
    }
}
