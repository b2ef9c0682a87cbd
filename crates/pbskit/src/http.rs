//! Blocking HTTP implementation of [`Api`].
//!
//! Talks to `<endpoint>/api2/json` with API token authentication. Ticket
//! login, token refresh and network-level retries are left to other layers.

use crate::client::{Api, Method};
use crate::error::{self, ApiError, Result};
use crate::path::ApiPath;
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Server URL, e.g. `https://pbs.example.com:8007`.
    pub endpoint: String,
    /// API token in `user@realm!name=secret` form.
    pub api_token: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Bound on each request, including the response body.
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_token: api_token.into(),
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Blocking client for the configuration API.
///
/// # Example
///
/// ```no_run
/// use pbskit::{Api, ApiPath, ClientOptions, HttpApi};
///
/// let api = HttpApi::new(&ClientOptions::new(
///     "https://pbs.example.com:8007",
///     "root@pam!automation=00000000-0000-0000-0000-000000000000",
/// ))
/// .unwrap();
/// let remotes = api.get(&ApiPath::parse("/config/remote")).unwrap();
/// println!("{remotes}");
/// ```
pub struct HttpApi {
    agent: ureq::Agent,
    base: Url,
    authorization: String,
}

impl HttpApi {
    /// Create a client.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let endpoint = options.endpoint.trim_end_matches('/');
        let base = Url::parse(&format!("{endpoint}/api2/json"))
            .map_err(|e| ApiError::InvalidPath(format!("{endpoint}: {e}")))?;

        let mut config = ureq::Agent::config_builder()
            .timeout_global(Some(options.timeout))
            .http_status_as_error(false);
        if options.insecure {
            warn!("TLS certificate verification disabled for {endpoint}");
            config = config.tls_config(
                ureq::tls::TlsConfig::builder()
                    .disable_verification(true)
                    .build(),
            );
        }
        let agent: ureq::Agent = config.build().into();

        Ok(Self {
            agent,
            base,
            authorization: format!("PBSAPIToken={}", options.api_token),
        })
    }

    /// Base URL requests are built on.
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn send(&self, method: Method, path: &ApiPath, body: Option<&Value>) -> Result<Value> {
        let url = path.to_url(&self.base)?;
        debug!("{method} {path}");

        let auth = self.authorization.as_str();
        let response = match (method, body) {
            (Method::Get, _) => self.agent.get(url.as_str()).header("Authorization", auth).call(),
            (Method::Delete, _) => self
                .agent
                .delete(url.as_str())
                .header("Authorization", auth)
                .call(),
            (Method::Post, body) => self
                .agent
                .post(url.as_str())
                .header("Authorization", auth)
                .send_json(body.unwrap_or(&Value::Null)),
            (Method::Put, body) => self
                .agent
                .put(url.as_str())
                .header("Authorization", auth)
                .send_json(body.unwrap_or(&Value::Null)),
        };
        handle(path, response)
    }
}

fn handle(path: &ApiPath, response: std::result::Result<Response<Body>, ureq::Error>) -> Result<Value> {
    let mut response = response?;
    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string()?;
    debug!("{path} -> HTTP {status}");

    if !(200..300).contains(&status) {
        return Err(ApiError::from_response(status, &path.to_string(), &text));
    }
    unwrap_envelope(&text)
}

/// Extract `data` from a `{"data": ..., "errors": ...}` envelope.
///
/// A successful status with a non-empty `errors` member is still a
/// validation failure.
pub(crate) fn unwrap_envelope(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let mut envelope: Value = serde_json::from_str(text)?;
    let fields = envelope
        .get("errors")
        .map(error::error_fields)
        .unwrap_or_default();
    if !fields.is_empty() {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("parameter verification errors")
            .trim()
            .to_string();
        return Err(ApiError::Validation { message, fields });
    }
    Ok(envelope
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

impl Api for HttpApi {
    fn get(&self, path: &ApiPath) -> Result<Value> {
        self.send(Method::Get, path, None)
    }

    fn post(&self, path: &ApiPath, body: &Value) -> Result<Value> {
        self.send(Method::Post, path, Some(body))
    }

    fn put(&self, path: &ApiPath, body: &Value) -> Result<Value> {
        self.send(Method::Put, path, Some(body))
    }

    fn delete(&self, path: &ApiPath) -> Result<Value> {
        self.send(Method::Delete, path, None)
    }
}
