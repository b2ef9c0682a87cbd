//! The remote API seam.

use crate::error::Result;
use crate::path::ApiPath;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous JSON API client.
///
/// Implementations return the unwrapped `data` member of the response
/// envelope and classify failures into [`crate::ApiError`] kinds. They must
/// be safe to share across threads: different resource instances may be
/// reconciled in parallel through one client.
pub trait Api: Send + Sync {
    /// Fetch an object or collection.
    fn get(&self, path: &ApiPath) -> Result<Value>;

    /// Create an object in a collection.
    fn post(&self, path: &ApiPath, body: &Value) -> Result<Value>;

    /// Update an object.
    fn put(&self, path: &ApiPath, body: &Value) -> Result<Value>;

    /// Remove an object.
    fn delete(&self, path: &ApiPath) -> Result<Value>;
}

impl<A: Api + ?Sized> Api for Arc<A> {
    fn get(&self, path: &ApiPath) -> Result<Value> {
        (**self).get(path)
    }

    fn post(&self, path: &ApiPath, body: &Value) -> Result<Value> {
        (**self).post(path, body)
    }

    fn put(&self, path: &ApiPath, body: &Value) -> Result<Value> {
        (**self).put(path, body)
    }

    fn delete(&self, path: &ApiPath) -> Result<Value> {
        (**self).delete(path)
    }
}
