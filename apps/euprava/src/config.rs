//! # Service Configuration
//!
//! One `ServiceConfig` is built at startup and shared by reference with every
//! component. Nothing else reads the process environment.
//!
//! ## Layering (later wins)
//!
//! 1. Built-in defaults
//! 2. TOML file given with `--config`
//! 3. Environment variables:
//!    - `EUPRAVA_BORDER_ADDR`, `EUPRAVA_REGISTRY_ADDR`,
//!      `EUPRAVA_PROSECUTION_ADDR`, `EUPRAVA_COURT_ADDR`: peer `HOST:PORT`
//!    - `EUPRAVA_DATABASE`: record database path
//!    - `EUPRAVA_RATE_LIMIT`: requests per second (0 disables)
//!    - `EUPRAVA_CORS_ORIGINS`: comma-separated origins, or `*`
//!    - `EUPRAVA_VERIFYING_KEY`: base64 ed25519 public key
//!    - `EUPRAVA_REQUEST_DEADLINE_MS`: per-request deadline
//! 4. CLI flags (applied by the `serve` command)

use euprava_core::EupravaError;
use euprava_core::breaker::BreakerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// SERVICES
// =============================================================================

/// The four government offices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Border,
    Registry,
    Prosecution,
    Court,
}

impl Service {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Border => "border",
            Self::Registry => "registry",
            Self::Prosecution => "prosecution",
            Self::Court => "court",
        }
    }

    /// Port a service listens on when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Border => 8001,
            Self::Registry => 8002,
            Self::Prosecution => 8003,
            Self::Court => 8004,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CONFIGURATION SECTIONS
// =============================================================================

/// `HOST:PORT` of every peer service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    pub border: String,
    pub registry: String,
    pub prosecution: String,
    pub court: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        let local = |service: Service| format!("127.0.0.1:{}", service.default_port());
        Self {
            border: local(Service::Border),
            registry: local(Service::Registry),
            prosecution: local(Service::Prosecution),
            court: local(Service::Court),
        }
    }
}

impl PeerConfig {
    /// Base URL of a peer. A bare `HOST:PORT` gets an `http://` scheme.
    #[must_use]
    pub fn base_url(&self, service: Service) -> String {
        let addr = match service {
            Service::Border => &self.border,
            Service::Registry => &self.registry,
            Service::Prosecution => &self.prosecution,
            Service::Court => &self.court,
        };
        let addr = addr.trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        }
    }
}

/// Circuit-breaker settings shared by every outbound client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    pub half_open_max_calls: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            cooldown_ms: defaults.cooldown.as_millis() as u64,
            half_open_max_calls: defaults.half_open_max_calls,
        }
    }
}

impl BreakerSettings {
    #[must_use]
    pub fn to_config(&self) -> BreakerConfig {
        BreakerConfig::default()
            .failure_threshold(self.failure_threshold)
            .cooldown(Duration::from_millis(self.cooldown_ms))
            .half_open_max_calls(self.half_open_max_calls)
    }
}

/// Token verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base64 ed25519 public key. `None` disables authentication.
    pub verifying_key: Option<String>,
    /// Lifetime of tokens issued by the CLI.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            verifying_key: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_REQUEST_DEADLINE_MS: u64 = 10_000;
const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// SERVICE CONFIG
// =============================================================================

/// Startup configuration of a service process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Record database path. Defaults to `euprava-<service>.db`.
    pub database: Option<PathBuf>,
    pub peers: PeerConfig,
    pub breaker: BreakerSettings,
    pub request_deadline_ms: u64,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Comma-separated allowed origins, or `*`. `None` means localhost only.
    pub cors_origins: Option<String>,
    pub auth: AuthConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database: None,
            peers: PeerConfig::default(),
            breaker: BreakerSettings::default(),
            request_deadline_ms: DEFAULT_REQUEST_DEADLINE_MS,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
            auth: AuthConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from defaults, an optional TOML file and
    /// environment overrides read through `lookup`.
    pub fn load(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EupravaError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    EupravaError::Config(format!("cannot read '{}': {}", path.display(), e))
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, EupravaError> {
        toml::from_str(text).map_err(|e| EupravaError::Config(e.to_string()))
    }

    /// Apply `EUPRAVA_*` overrides.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), EupravaError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(addr) = var("EUPRAVA_BORDER_ADDR") {
            self.peers.border = addr;
        }
        if let Some(addr) = var("EUPRAVA_REGISTRY_ADDR") {
            self.peers.registry = addr;
        }
        if let Some(addr) = var("EUPRAVA_PROSECUTION_ADDR") {
            self.peers.prosecution = addr;
        }
        if let Some(addr) = var("EUPRAVA_COURT_ADDR") {
            self.peers.court = addr;
        }
        if let Some(path) = var("EUPRAVA_DATABASE") {
            self.database = Some(PathBuf::from(path));
        }
        if let Some(value) = var("EUPRAVA_RATE_LIMIT") {
            self.rate_limit = parse_number("EUPRAVA_RATE_LIMIT", &value)?;
        }
        if let Some(origins) = var("EUPRAVA_CORS_ORIGINS") {
            self.cors_origins = Some(origins);
        }
        if let Some(key) = var("EUPRAVA_VERIFYING_KEY") {
            self.auth.verifying_key = Some(key);
        }
        if let Some(value) = var("EUPRAVA_REQUEST_DEADLINE_MS") {
            self.request_deadline_ms = parse_number("EUPRAVA_REQUEST_DEADLINE_MS", &value)?;
        }
        Ok(())
    }

    /// Reject values no service can run with.
    pub fn validate(&self) -> Result<(), EupravaError> {
        if self.breaker.failure_threshold == 0 {
            return Err(EupravaError::Config(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        if self.breaker.half_open_max_calls == 0 {
            return Err(EupravaError::Config(
                "breaker.half_open_max_calls must be at least 1".into(),
            ));
        }
        if self.request_deadline_ms == 0 {
            return Err(EupravaError::Config(
                "request_deadline_ms must be positive".into(),
            ));
        }
        if let Some(key) = &self.auth.verifying_key {
            crate::token::TokenVerifier::from_base64(key)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    /// Database path for `service`.
    #[must_use]
    pub fn database_for(&self, service: Service) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("euprava-{}.db", service)))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, EupravaError> {
    value
        .trim()
        .parse()
        .map_err(|_| EupravaError::Config(format!("{} must be a number, got '{}'", name, value)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServiceConfig::load(None, env(&[])).unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown_ms, 10_000);
        assert_eq!(config.request_deadline(), Duration::from_secs(10));
        assert_eq!(config.rate_limit, 100);
        assert_eq!(
            config.peers.base_url(Service::Registry),
            "http://127.0.0.1:8002"
        );
        assert_eq!(
            config.database_for(Service::Court),
            PathBuf::from("euprava-court.db")
        );
    }

    #[test]
    fn toml_then_env() {
        let mut config = ServiceConfig::from_toml(
            r#"
            rate_limit = 5
            [peers]
            border = "granica:9000"
            [breaker]
            failure_threshold = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.breaker.failure_threshold, 7);
        assert_eq!(config.breaker.cooldown_ms, 10_000);
        assert_eq!(config.peers.base_url(Service::Border), "http://granica:9000");

        config
            .apply_env(env(&[
                ("EUPRAVA_BORDER_ADDR", "https://border.gov.rs/"),
                ("EUPRAVA_RATE_LIMIT", "0"),
            ]))
            .unwrap();
        assert_eq!(
            config.peers.base_url(Service::Border),
            "https://border.gov.rs"
        );
        assert_eq!(config.rate_limit, 0);
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            ServiceConfig::load(None, env(&[("EUPRAVA_REQUEST_DEADLINE_MS", "soon")])),
            Err(EupravaError::Config(_))
        ));
        assert!(matches!(
            ServiceConfig::load(None, env(&[("EUPRAVA_VERIFYING_KEY", "not-a-key")])),
            Err(EupravaError::Config(_))
        ));
        let mut config = ServiceConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(config.validate().is_err());
        assert!(ServiceConfig::from_toml("rate_limit = \"many\"").is_err());
    }
}
