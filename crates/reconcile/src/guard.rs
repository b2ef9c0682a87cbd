//! Optimistic concurrency via the remote digest
//!
//! The digest read most recently travels with every update (in the body)
//! and delete (as a query parameter). Enforcement happens on the remote
//! side; these helpers only place and pick up the token.

use crate::codec::WirePayload;
use crate::types::VersionToken;
use serde_json::Value;

/// Wire name of the version token
pub const DIGEST: &str = "digest";

/// Attach the token to an update body
///
/// Without a token the body is left as-is and the remote applies its own
/// policy.
pub fn attach(body: &mut WirePayload, token: Option<&VersionToken>) {
    if let Some(token) = token {
        body.insert(DIGEST.to_string(), Value::String(token.as_str().to_string()));
    }
}

/// Query parameter carrying the token on delete
pub fn query(token: Option<&VersionToken>) -> Option<(&'static str, String)> {
    token.map(|t| (DIGEST, t.as_str().to_string()))
}

/// Pick the token out of a read response
pub fn extract(wire: &WirePayload) -> Option<VersionToken> {
    wire.get(DIGEST)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(VersionToken::new)
}
