//! Session configuration
//!
//! Every field has a default matching the admin application's server, so an
//! empty document (or no document at all) yields a usable configuration.

use crate::paths::SkipRules;
pub use config::ConfigError;
use serde::{Deserialize, Serialize};

/// Top-level session manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Page origin (`scheme://host[:port]`). Requests to any other origin
    /// never carry the bearer credential.
    pub origin: Option<String>,

    /// Authentication endpoints
    pub endpoints: EndpointConfig,

    /// Anti-forgery cookie contract
    pub cookies: CookieConfig,

    /// Timers and thresholds
    pub timing: TimingConfig,

    /// Paths whose failures are passed through silently
    pub skip: SkipRules,

    /// Path prefixes whose navigation/submission is gated on a fresh credential
    pub protected_prefixes: Vec<String>,

    /// Login entry point used by the expired-session fallback
    pub login_url: String,

    /// Safe default location
    pub home_url: String,

    /// Session storage key holding the access credential
    pub storage_key: String,
}

/// Authentication endpoint paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub renew: String,
    pub logout: String,
    pub login: String,
    pub register: String,
}

/// Double-submit anti-forgery cookie/header names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Client-readable cookie holding the anti-forgery token
    pub csrf_cookie: String,

    /// Request header mirroring the cookie
    pub csrf_header: String,

    /// Readable cookies left alone when an expired session is cleaned up
    pub preserved: Vec<String>,
}

/// Timing policy. Milliseconds unless the field name says otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub heartbeat_interval_ms: u64,
    pub idle_ceiling_ms: u64,
    pub renewal_skew_secs: u64,
    pub min_renewal_gap_ms: u64,
    pub activity_debounce_ms: u64,
    pub renewal_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            origin: None,
            endpoints: EndpointConfig::default(),
            cookies: CookieConfig::default(),
            timing: TimingConfig::default(),
            skip: SkipRules::default(),
            protected_prefixes: vec!["/admin".to_string()],
            login_url: "/login".to_string(),
            home_url: "/".to_string(),
            storage_key: "keeper.access_token".to_string(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            renew: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            csrf_cookie: "XSRF-TOKEN".to_string(),
            csrf_header: "X-CSRF-Token".to_string(),
            preserved: vec!["XSRF-TOKEN".to_string()],
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            idle_ceiling_ms: 15 * 60_000,
            renewal_skew_secs: 60,
            min_renewal_gap_ms: 15_000,
            activity_debounce_ms: 1_000,
            renewal_grace_ms: 300,
        }
    }
}

impl EndpointConfig {
    /// The bare authentication endpoints, which never receive the bearer header
    pub fn auth_endpoints(&self) -> [&str; 4] {
        [&self.login, &self.register, &self.renew, &self.logout]
    }
}

impl SessionConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::load(config::Config::builder().add_source(config::File::from_str(
            source,
            config::FileFormat::Toml,
        )))
    }

    /// Parse a JSON document, e.g. one embedded in the page
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Self::load(config::Config::builder().add_source(config::File::from_str(
            source,
            config::FileFormat::Json,
        )))
    }

    /// Layer an optional TOML document and `KEEPER__*` environment variables
    /// over the defaults (e.g. `KEEPER__TIMING__RENEWAL_SKEW_SECS=45`).
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result fails validation
    pub fn from_sources(toml: Option<&str>) -> Result<Self, ConfigError> {
        Self::layered(toml, None)
    }

    /// `env` replaces the process environment when given
    fn layered(
        toml: Option<&str>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(source) = toml {
            builder = builder.add_source(config::File::from_str(source, config::FileFormat::Toml));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("KEEPER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );
        Self::load(builder)
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let parsed: Self = builder.build()?.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check invariants the components rely on
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::Message` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(origin) = &self.origin {
            validators::validate_origin(origin, "origin")?;
        }

        validators::validate_path(&self.endpoints.renew, "endpoints.renew")?;
        validators::validate_path(&self.endpoints.logout, "endpoints.logout")?;
        validators::validate_path(&self.endpoints.login, "endpoints.login")?;
        validators::validate_path(&self.endpoints.register, "endpoints.register")?;

        validators::validate_not_empty(&self.cookies.csrf_cookie, "cookies.csrf_cookie")?;
        validators::validate_not_empty(&self.cookies.csrf_header, "cookies.csrf_header")?;
        http::HeaderName::from_bytes(self.cookies.csrf_header.as_bytes()).map_err(|e| {
            ConfigError::Message(format!("cookies.csrf_header: invalid header name - {e}"))
        })?;

        validators::validate_not_empty(&self.login_url, "login_url")?;
        validators::validate_not_empty(&self.home_url, "home_url")?;
        validators::validate_not_empty(&self.storage_key, "storage_key")?;

        let timing = &self.timing;
        validators::validate_positive(timing.heartbeat_interval_ms, "timing.heartbeat_interval_ms")?;
        validators::validate_positive(timing.idle_ceiling_ms, "timing.idle_ceiling_ms")?;
        validators::validate_range(timing.renewal_skew_secs, 1, 3_600, "timing.renewal_skew_secs")?;

        for prefix in &self.protected_prefixes {
            validators::validate_path(prefix, "protected_prefixes")?;
        }

        Ok(())
    }
}

mod validators {
    use config::ConfigError;

    pub fn validate_not_empty(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::Message(format!("{field}: cannot be empty")));
        }
        Ok(())
    }

    pub fn validate_path(value: &str, field: &str) -> Result<(), ConfigError> {
        validate_not_empty(value, field)?;
        if !value.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "{field}: must be an absolute path starting with '/'"
            )));
        }
        Ok(())
    }

    pub fn validate_origin(value: &str, field: &str) -> Result<(), ConfigError> {
        let url = url::Url::parse(value)
            .map_err(|e| ConfigError::Message(format!("{field}: invalid URL - {e}")))?;
        if !url.origin().is_tuple() {
            return Err(ConfigError::Message(format!(
                "{field}: must be an http(s) origin"
            )));
        }
        Ok(())
    }

    pub fn validate_positive(value: u64, field: &str) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Message(format!("{field}: must be greater than zero")));
        }
        Ok(())
    }

    pub fn validate_range(value: u64, min: u64, max: u64, field: &str) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::Message(format!(
                "{field}: must be between {min} and {max}, got {value}"
            )));
        }
        Ok(())
    }
}
