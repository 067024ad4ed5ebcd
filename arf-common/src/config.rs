//! Configuration loading and resolution
//!
//! Values are resolved with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with defaults. A TOML file that exists but cannot be parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "ARF_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub sfmc: SfmcConfig,
    pub cache: CacheConfig,
    pub aggregation: AggregationConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static` (disabled when unset)
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: None,
        }
    }
}

/// Marketing platform endpoints and OAuth client registration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SfmcConfig {
    /// Authentication base URL (`/v2/token`, `/v2/authorize`, `/v2/userinfo` live below it)
    pub auth_url: String,
    /// SOAP endpoint receiving `Retrieve` envelopes
    pub soap_endpoint: String,
    /// REST base URL
    pub rest_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl SfmcConfig {
    /// Names of required settings that are still empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.auth_url.trim().is_empty() {
            missing.push("auth_url");
        }
        if self.soap_endpoint.trim().is_empty() {
            missing.push("soap_endpoint");
        }
        if self.rest_endpoint.trim().is_empty() {
            missing.push("rest_endpoint");
        }
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        if self.redirect_uri.trim().is_empty() {
            missing.push("redirect_uri");
        }
        missing
    }
}

/// Longest accepted cache entry lifetime (30 days)
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Partial result cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Sliding expiry window per entry
    pub ttl_secs: u64,
    /// How often expired entries are swept
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            sweep_interval_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Aggregation engine and adapter fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// End-to-end deadline for one aggregation request
    pub deadline_secs: u64,
    /// REST page size for paginated listings
    pub page_size: u32,
    /// Ceiling on concurrent sub-fetches inside a single adapter call
    pub fanout_limit: usize,
    /// Insert a cooling pause after this many sub-fetches have been started
    pub cooldown_every: usize,
    /// Length of the cooling pause
    pub cooldown_ms: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 30,
            page_size: 50,
            fanout_limit: 50,
            cooldown_every: 50,
            cooldown_ms: 500,
        }
    }
}

impl AggregationConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub static_dir: Option<PathBuf>,
}

/// Platform default config file: `<config_dir>/arf/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("arf").join("config.toml"))
}

/// Load a TOML config file, falling back to defaults when the file is absent
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

impl TomlConfig {
    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(dir) = get("ARF_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }

        if let Some(v) = get("AUTHORIZATION_URL") {
            self.sfmc.auth_url = v;
        }
        if let Some(v) = get("SOAP_ENDPOINT") {
            self.sfmc.soap_endpoint = v;
        }
        if let Some(v) = get("REST_ENDPOINT") {
            self.sfmc.rest_endpoint = v;
        }
        if let Some(v) = get("CLIENT_ID") {
            self.sfmc.client_id = v;
        }
        if let Some(v) = get("CLIENT_SECRET") {
            self.sfmc.client_secret = v;
        }
        if let Some(v) = get("REDIRECT_URI") {
            self.sfmc.redirect_uri = v;
        }

        if let Some(v) = get("ARF_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env("ARF_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("ARF_DEADLINE_SECS") {
            self.aggregation.deadline_secs = parse_env("ARF_DEADLINE_SECS", &v)?;
        }
        if let Some(v) = get("ARF_LOG_LEVEL") {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Overlay command-line values
    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(dir) = &cli.static_dir {
            self.server.static_dir = Some(dir.clone());
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.deadline_secs == 0 {
            return Err(Error::Config("aggregation.deadline_secs must be > 0".to_string()));
        }
        if self.aggregation.page_size == 0 {
            return Err(Error::Config("aggregation.page_size must be > 0".to_string()));
        }
        if self.aggregation.fanout_limit == 0 {
            return Err(Error::Config("aggregation.fanout_limit must be > 0".to_string()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::Config("cache.ttl_secs must be > 0".to_string()));
        }
        if self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(Error::Config(format!(
                "cache.ttl_secs must be <= {}",
                MAX_CACHE_TTL_SECS
            )));
        }
        Ok(())
    }
}

/// Resolve the effective configuration: CLI > ENV > TOML > defaults
pub fn resolve_config(cli: &CliOverrides) -> Result<TomlConfig> {
    let path = cli
        .config_path
        .clone()
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .or_else(default_config_path);

    let mut config = match path {
        Some(path) => load_toml_config(&path)?,
        None => {
            warn!("Could not determine config directory, using defaults");
            TomlConfig::default()
        }
    };

    config.apply_env()?;
    config.apply_cli(cli);
    config.validate()?;

    let missing = config.sfmc.missing_fields();
    if !missing.is_empty() {
        warn!(
            missing = %missing.join(", "),
            "Platform settings incomplete; upstream calls will fail until configured"
        );
    }

    Ok(config)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.aggregation.deadline(), Duration::from_secs(30));
        assert_eq!(config.aggregation.fanout_limit, 50);
        assert_eq!(config.aggregation.cooldown(), Duration::from_millis(500));
    }

    #[test]
    fn oversized_cache_ttl_is_rejected() {
        let max = u64::MAX.to_string();
        let mut config = TomlConfig::default();
        config
            .apply_env_from(lookup(&[("ARF_CACHE_TTL_SECS", max.as_str())]))
            .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.cache.ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_toml_values() {
        let mut config: TomlConfig = toml::from_str("[server]\nport = 9000\n").unwrap();
        config
            .apply_env_from(lookup(&[("PORT", "9100"), ("SOAP_ENDPOINT", "https://soap.test")]))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.sfmc.soap_endpoint, "https://soap.test");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = TomlConfig::default();
        config.apply_env_from(lookup(&[("PORT", "  ")])).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn invalid_env_number_is_config_error() {
        let mut config = TomlConfig::default();
        let err = config
            .apply_env_from(lookup(&[("ARF_DEADLINE_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn cli_overrides_env() {
        let mut config = TomlConfig::default();
        config.apply_env_from(lookup(&[("PORT", "9100")])).unwrap();
        config.apply_cli(&CliOverrides {
            port: Some(7000),
            ..Default::default()
        });
        assert_eq!(config.server.port, 7000);
    }

    #[test]
    fn zero_deadline_is_rejected() {
        let mut config = TomlConfig::default();
        config.aggregation.deadline_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_lists_empty_settings() {
        let sfmc = SfmcConfig {
            auth_url: "https://auth.test".to_string(),
            ..Default::default()
        };
        let missing = sfmc.missing_fields();
        assert!(!missing.contains(&"auth_url"));
        assert!(missing.contains(&"client_secret"));
    }
}
