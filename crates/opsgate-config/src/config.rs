// crates/opsgate-config/src/config.rs
// ============================================================================
// Module: Opsgate Configuration
// Description: Configuration loading and validation for the Opsgate gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file resolved from an explicit path,
//! the `OPSGATE_CONFIG` environment variable, or `opsgate.toml` in the
//! working directory. Files over the size limit and invalid field values
//! fail closed. Store and API-key secrets can be injected through
//! environment variables, which take precedence over file values.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "opsgate.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "OPSGATE_CONFIG";
/// Environment override for the store `apikey` header value.
pub(crate) const STORE_API_KEY_ENV_VAR: &str = "OPSGATE_STORE_API_KEY";
/// Environment override for the store service bearer token.
pub(crate) const SERVICE_KEY_ENV_VAR: &str = "OPSGATE_SERVICE_KEY";
/// Environment override for the static fallback API key.
pub(crate) const STATIC_API_KEY_ENV_VAR: &str = "OPSGATE_STATIC_API_KEY";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of any configured secret.
pub(crate) const MAX_SECRET_LENGTH: usize = 4096;
/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8787";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default store request timeout in milliseconds.
const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;
/// Default table holding hashed API keys.
const DEFAULT_KEYS_TABLE: &str = "api_keys";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Opsgate gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpsgateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// External store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base path the gateway routes are mounted under.
    #[serde(default)]
    pub base_path: String,
    /// Maximum allowed request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_path: String::new(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// External store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// REST root URL of the external store.
    #[serde(default)]
    pub url: String,
    /// Value of the `apikey` header sent with store requests.
    #[serde(default)]
    pub api_key: String,
    /// Service-level bearer token used by privileged handles.
    #[serde(default)]
    pub service_key: String,
    /// Store request timeout in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// Allow cleartext `http://` store URLs (development only).
    #[serde(default)]
    pub allow_http: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            service_key: String::new(),
            timeout_ms: default_store_timeout_ms(),
            allow_http: false,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Static fallback API key accepted when the keys table has no match.
    #[serde(default)]
    pub static_api_key: String,
    /// Table holding hashed, revocable API keys.
    #[serde(default = "default_keys_table")]
    pub keys_table: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            static_api_key: String::new(),
            keys_table: default_keys_table(),
        }
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl OpsgateConfig {
    /// Loads configuration from disk using the default resolution rules and
    /// applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file is not valid UTF-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies environment-variable secret overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var(STORE_API_KEY_ENV_VAR) {
            self.store.api_key = value;
        }
        if let Ok(value) = env::var(SERVICE_KEY_ENV_VAR) {
            self.store.service_key = value;
        }
        if let Ok(value) = env::var(STATIC_API_KEY_ENV_VAR) {
            self.auth.static_api_key = value;
        }
    }

    /// Validates the configuration, failing closed on any suspect value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind is not a socket address".to_string()))?;
        if !self.server.base_path.is_empty() && !self.server.base_path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "server.base_path must start with '/'".to_string(),
            ));
        }
        if self.server.base_path.ends_with('/') {
            return Err(ConfigError::Invalid(
                "server.base_path must not end with '/'".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be positive".to_string()));
        }
        if self.store.url.is_empty() {
            return Err(ConfigError::Invalid("store.url is required".to_string()));
        }
        let url = Url::parse(&self.store.url)
            .map_err(|_| ConfigError::Invalid("store.url is not a valid url".to_string()))?;
        match url.scheme() {
            "https" => {}
            "http" if self.store.allow_http => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "store.url must use https (set store.allow_http for development)".to_string(),
                ));
            }
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigError::Invalid("store.timeout_ms must be positive".to_string()));
        }
        for (field, value) in [
            ("store.api_key", &self.store.api_key),
            ("store.service_key", &self.store.service_key),
            ("auth.static_api_key", &self.auth.static_api_key),
        ] {
            if value.len() > MAX_SECRET_LENGTH {
                return Err(ConfigError::Invalid(format!("{field} exceeds length limit")));
            }
        }
        if self.auth.keys_table.is_empty() {
            return Err(ConfigError::Invalid("auth.keys_table is required".to_string()));
        }
        Ok(())
    }
}

/// Resolves the config path from an explicit argument, the environment, or
/// the default filename.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map_or_else(
        || {
            env::var(CONFIG_ENV_VAR)
                .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from)
        },
        Path::to_path_buf,
    )
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default store timeout.
const fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

/// Default API keys table.
fn default_keys_table() -> String {
    DEFAULT_KEYS_TABLE.to_string()
}

// ============================================================================
// SECTION: Example
// ============================================================================

/// Returns a commented example `opsgate.toml`.
#[must_use]
pub fn config_toml_example() -> &'static str {
    r#"# Opsgate gateway configuration.

[server]
bind = "127.0.0.1:8787"
# Routes are mounted under this prefix, e.g. "/api".
base_path = ""
max_body_bytes = 1048576

[store]
# REST root of the external store.
url = "https://store.example.com/rest/v1"
# Secrets may also be supplied via OPSGATE_STORE_API_KEY and
# OPSGATE_SERVICE_KEY.
api_key = ""
service_key = ""
timeout_ms = 10000
allow_http = false

[auth]
# Fallback key checked when the api_keys table has no match; may be
# supplied via OPSGATE_STATIC_API_KEY.
static_api_key = ""
keys_table = "api_keys"
"#
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// The file could not be parsed as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A field value failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
