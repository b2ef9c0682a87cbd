use anyhow::{Context, Result, bail};
use pbskit::{ClientOptions, HttpApi};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::Reconciler;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("pbsync"))
}

// ============================================================================
// Provider Config
// ============================================================================

/// Connection settings for a Proxmox Backup Server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Server URL, e.g. `https://pbs.example.com:8007`
    #[serde(default)]
    pub endpoint: String,
    /// API token in `user@realm!name=secret` form
    #[serde(default)]
    pub api_token: String,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_token: String::new(),
            insecure: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderConfig {
    /// Default location of config.toml
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load config.toml if present, apply `PBS_*` overrides and validate
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        let mut config = if path.exists() {
            Self::read(&path)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a specific file, apply `PBS_*` overrides and validate
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config format in {}", path.display()))
    }

    /// Save to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }

    /// Apply `PBS_ENDPOINT`, `PBS_API_TOKEN`, `PBS_INSECURE` and `PBS_TIMEOUT`
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = lookup("PBS_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(token) = lookup("PBS_API_TOKEN").filter(|v| !v.is_empty()) {
            self.api_token = token;
        }
        if let Some(insecure) = lookup("PBS_INSECURE") {
            self.insecure = insecure.trim().eq_ignore_ascii_case("true");
        }
        if let Some(timeout) = lookup("PBS_TIMEOUT").filter(|v| !v.is_empty()) {
            self.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("PBS_TIMEOUT must be a number of seconds, got '{timeout}'"))?;
        }
        Ok(())
    }

    /// Check required settings and normalize the endpoint
    pub fn validate(&mut self) -> Result<()> {
        let endpoint = self.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            bail!("endpoint is required (set it in config.toml or PBS_ENDPOINT)");
        }
        let url = url::Url::parse(&endpoint).with_context(|| format!("Invalid endpoint '{endpoint}'"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("endpoint must use http or https, got '{}'", url.scheme());
        }
        if url.host_str().is_none() {
            bail!("endpoint '{endpoint}' has no host");
        }
        if self.api_token.trim().is_empty() {
            bail!("api_token is required (set it in config.toml or PBS_API_TOKEN)");
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        self.endpoint = endpoint;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            endpoint: self.endpoint.clone(),
            api_token: self.api_token.clone(),
            insecure: self.insecure,
            timeout: self.timeout(),
        }
    }

    /// Build a reconciler talking to the configured server
    pub fn connect(&self) -> Result<Reconciler<HttpApi>> {
        let api = HttpApi::new(&self.client_options())
            .with_context(|| format!("Could not create client for {}", self.endpoint))?;
        Ok(Reconciler::new(api))
    }
}
