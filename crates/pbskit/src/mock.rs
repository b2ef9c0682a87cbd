//! In-memory [`Api`] for tests.
//!
//! Behaves like the configuration API where it matters for reconciliation:
//! objects carry a digest that is checked on update and delete, the
//! `delete` list clears fields, write-only fields are never echoed back,
//! and missing objects report `NotFound`.
//!
//! ```
//! use pbskit::{Api, ApiPath, MockApi};
//! use serde_json::json;
//!
//! let mock = MockApi::new();
//! mock.register("/config/remote", "name", &["password"]);
//!
//! let remotes = ApiPath::parse("/config/remote");
//! mock.post(&remotes, &json!({"name": "r1", "host": "pbs", "password": "x"})).unwrap();
//!
//! let read = mock.get(&remotes.join("r1")).unwrap();
//! assert_eq!(read["host"], "pbs");
//! assert!(read.get("password").is_none());
//! assert!(read.get("digest").is_some());
//! ```

use crate::client::{Api, Method};
use crate::error::{ApiError, Result};
use crate::path::ApiPath;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// A request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Path including query, as displayed by [`ApiPath`].
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct Collection {
    key: String,
    write_only: BTreeSet<String>,
    objects: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, Collection>,
    rejected: BTreeMap<String, String>,
    failures: VecDeque<ApiError>,
    requests: Vec<Request>,
}

/// Mock API for testing without a server.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<State>>,
}

impl MockApi {
    /// Create a mock with no collections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Declare a collection, its key field and the fields it never returns.
    pub fn register(&self, collection: &str, key: &str, write_only: &[&str]) {
        let path = ApiPath::parse(collection).to_string();
        self.lock().collections.insert(
            path,
            Collection {
                key: key.to_string(),
                write_only: write_only.iter().map(|s| (*s).to_string()).collect(),
                objects: BTreeMap::new(),
            },
        );
    }

    /// Make the server reject a wire field as unknown.
    pub fn reject_field(&self, wire: &str, reason: &str) {
        self.lock()
            .rejected
            .insert(wire.to_string(), reason.to_string());
    }

    /// Fail the next request with `error`.
    pub fn fail_next(&self, error: ApiError) {
        self.lock().failures.push_back(error);
    }

    /// Change a stored object as another writer would.
    ///
    /// Returns false if the object does not exist.
    pub fn modify(&self, path: &str, field: &str, value: Value) -> bool {
        let path = ApiPath::parse(path);
        let mut state = self.lock();
        match object_mut(&mut state, &path) {
            Some(object) => {
                object.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Stored object, including write-only fields.
    pub fn object(&self, path: &str) -> Option<Map<String, Value>> {
        let path = ApiPath::parse(path);
        let mut state = self.lock();
        object_mut(&mut state, &path).map(|o| o.clone())
    }

    /// Current digest of a stored object.
    pub fn digest(&self, path: &str) -> Option<String> {
        self.object(path).map(|o| digest(&o))
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.lock().requests.clone()
    }

    /// Requests seen so far, except reads.
    pub fn writes(&self) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != Method::Get)
            .collect()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }

    fn handle(&self, method: Method, path: &ApiPath, body: Option<&Value>) -> Result<Value> {
        let mut state = self.lock();
        state.requests.push(Request {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        match method {
            Method::Get => get(&state, path),
            Method::Post => post(&mut state, path, body),
            Method::Put => put(&mut state, path, body),
            Method::Delete => delete(&mut state, path),
        }
    }
}

impl Api for MockApi {
    fn get(&self, path: &ApiPath) -> Result<Value> {
        self.handle(Method::Get, path, None)
    }

    fn post(&self, path: &ApiPath, body: &Value) -> Result<Value> {
        self.handle(Method::Post, path, Some(body))
    }

    fn put(&self, path: &ApiPath, body: &Value) -> Result<Value> {
        self.handle(Method::Put, path, Some(body))
    }

    fn delete(&self, path: &ApiPath) -> Result<Value> {
        self.handle(Method::Delete, path, None)
    }
}

fn digest(object: &Map<String, Value>) -> String {
    let canonical = Value::Object(object.clone()).to_string();
    blake3::hash(canonical.as_bytes()).to_hex()[..32].to_string()
}

fn not_found(path: &ApiPath) -> ApiError {
    ApiError::NotFound {
        path: path.to_string(),
        message: format!("{} does not exist", path.last().unwrap_or_default()),
    }
}

fn object_mut<'a>(state: &'a mut State, path: &ApiPath) -> Option<&'a mut Map<String, Value>> {
    let parent = path.parent()?.to_string();
    let name = path.last()?;
    state.collections.get_mut(&parent)?.objects.get_mut(name)
}

fn check_rejected(state: &State, body: &Map<String, Value>) -> Result<()> {
    let fields: BTreeMap<String, String> = body
        .keys()
        .filter_map(|k| state.rejected.get(k).map(|r| (k.clone(), r.clone())))
        .collect();
    if fields.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation {
            message: "parameter verification errors".to_string(),
            fields,
        })
    }
}

fn body_object(body: Option<&Value>) -> Result<Map<String, Value>> {
    match body {
        Some(Value::Object(map)) => Ok(map.clone()),
        _ => Err(ApiError::http("request body must be an object", Some(400))),
    }
}

fn get(state: &State, path: &ApiPath) -> Result<Value> {
    if let Some(collection) = state.collections.get(&path.to_string()) {
        let items = collection
            .objects
            .values()
            .map(|o| Value::Object(visible(collection, o)))
            .collect();
        return Ok(Value::Array(items));
    }
    let parent = path.parent().ok_or_else(|| not_found(path))?;
    let collection = state
        .collections
        .get(&parent.to_string())
        .ok_or_else(|| not_found(path))?;
    let object = path
        .last()
        .and_then(|name| collection.objects.get(name))
        .ok_or_else(|| not_found(path))?;
    Ok(Value::Object(visible(collection, object)))
}

fn visible(collection: &Collection, object: &Map<String, Value>) -> Map<String, Value> {
    let mut shown: Map<String, Value> = object
        .iter()
        .filter(|(k, _)| !collection.write_only.contains(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    shown.insert("digest".to_string(), Value::String(digest(object)));
    shown
}

fn post(state: &mut State, path: &ApiPath, body: Option<&Value>) -> Result<Value> {
    let object = body_object(body)?;
    check_rejected(state, &object)?;
    let collection = state
        .collections
        .get_mut(&path.to_string())
        .ok_or_else(|| not_found(path))?;
    let name = object
        .get(&collection.key)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Validation {
            message: "parameter verification errors".to_string(),
            fields: BTreeMap::from([(collection.key.clone(), "property is missing".to_string())]),
        })?
        .to_string();
    if collection.objects.contains_key(&name) {
        return Err(ApiError::http(format!("'{name}' already exists"), Some(400)));
    }
    collection.objects.insert(name, object);
    Ok(Value::Null)
}

fn put(state: &mut State, path: &ApiPath, body: Option<&Value>) -> Result<Value> {
    let mut changes = body_object(body)?;
    let expected = changes.remove("digest");
    let removals = changes.remove("delete");
    check_rejected(state, &changes)?;

    let object = object_mut(state, path).ok_or_else(|| not_found(path))?;
    if let Some(expected) = expected {
        if expected.as_str() != Some(digest(object).as_str()) {
            return Err(ApiError::conflict());
        }
    }
    if let Some(Value::Array(removals)) = removals {
        for field in removals.iter().filter_map(Value::as_str) {
            object.remove(field);
        }
    }
    for (k, v) in changes {
        object.insert(k, v);
    }
    Ok(Value::Null)
}

fn delete(state: &mut State, path: &ApiPath) -> Result<Value> {
    let object = object_mut(state, path).ok_or_else(|| not_found(path))?;
    if let Some(expected) = path.query_value("digest") {
        if expected != digest(object) {
            return Err(ApiError::conflict());
        }
    }
    let parent = path.parent().map(|p| p.to_string()).unwrap_or_default();
    if let (Some(collection), Some(name)) = (state.collections.get_mut(&parent), path.last()) {
        collection.objects.remove(name);
    }
    Ok(Value::Null)
}
