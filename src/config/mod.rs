//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the aggregator service.
//! Configuration includes API settings, cache TTL, outbound HTTP timeouts and
//! per-exchange endpoints. Exchange credentials are never stored in the file:
//! the file names the environment variables that hold them.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that overrides the configuration file path.
pub const CONFIG_PATH_ENV: &str = "APY_AGGREGATOR_CONFIG_PATH";

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/aggregator.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
    /// Product cache settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Per-exchange endpoints and credential variable names
    pub exchanges: ExchangesConfig,
}

/// API server configuration for the dashboard-facing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

/// Product cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for cached aggregation results in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 120 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Outbound HTTP configuration shared by all exchange adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every exchange request in milliseconds
    pub timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// The four integrated exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangesConfig {
    pub binance: ExchangeConfig,
    pub bybit: ExchangeConfig,
    pub okx: ExchangeConfig,
    pub bitget: ExchangeConfig,
}

/// Settings for a single exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Disabled exchanges only produce placeholders
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// REST base URL (e.g. "https://api.binance.com")
    pub base_url: String,
    /// Logo reference passed through to the dashboard
    #[serde(default)]
    pub logo: String,
    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Name of the environment variable holding the API secret
    #[serde(default)]
    pub api_secret_env: Option<String>,
    /// Name of the environment variable holding the API passphrase
    #[serde(default)]
    pub passphrase_env: Option<String>,
    /// Delay between consecutive history requests in milliseconds
    #[serde(default)]
    pub history_delay_ms: u64,
}

fn default_enabled() -> bool {
    true
}

impl ExchangeConfig {
    /// Configuration for an exchange that needs no credentials.
    pub fn public(base_url: impl Into<String>, logo: impl Into<String>) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
            logo: logo.into(),
            api_key_env: None,
            api_secret_env: None,
            passphrase_env: None,
            history_delay_ms: 0,
        }
    }

    pub fn history_delay(&self) -> Duration {
        Duration::from_millis(self.history_delay_ms)
    }
}

/// API credentials resolved from the environment.
///
/// `Debug` is implemented by hand so secrets never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// Loads credentials from the environment variables named in `config`.
    ///
    /// # Returns
    ///
    /// * `Some(Credentials)` - Key and secret variables are set and non-empty
    /// * `None` - Either variable is unnamed, unset or empty
    pub fn from_env(config: &ExchangeConfig) -> Option<Self> {
        let api_key = read_env(config.api_key_env.as_deref())?;
        let api_secret = read_env(config.api_secret_env.as_deref())?;
        Some(Self {
            api_key,
            api_secret,
            passphrase: read_env(config.passphrase_env.as_deref()),
        })
    }
}

fn read_env(name: Option<&str>) -> Option<String> {
    let value = std::env::var(name?).ok()?;
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is usable
    /// - `Err(anyhow::Error)` - A setting is out of range or missing
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("Configuration error: cache.ttl_secs must be greater than zero");
        }
        if self.http.timeout_ms == 0 {
            anyhow::bail!("Configuration error: http.timeout_ms must be greater than zero");
        }
        if self.api.cors_origins.is_empty() {
            anyhow::bail!("Configuration error: api.cors_origins must list at least one origin (use \"*\" for any)");
        }
        for (name, exchange) in self.exchanges.iter() {
            if exchange.base_url.trim().is_empty() {
                anyhow::bail!("Configuration error: exchanges.{}.base_url is empty", name);
            }
            url::Url::parse(&exchange.base_url).map_err(|e| {
                anyhow::anyhow!("Configuration error: exchanges.{}.base_url is invalid: {}", name, e)
            })?;
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// Path priority: `path` argument > `APY_AGGREGATOR_CONFIG_PATH` > `config/aggregator.toml`.
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Successfully loaded and validated configuration
    /// - `Err(anyhow::Error)` - File missing, unparsable or invalid
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(p) => p.to_string(),
            None => std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        };

        if !std::path::Path::new(&config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/aggregator.template.toml config/aggregator.toml\n\
                Then export the credential variables it names.",
                config_path
            ));
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read configuration file '{}'", config_path))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse configuration file '{}'", config_path))?;
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Creates a default configuration pointing at the public exchange APIs.
    ///
    /// Suitable for local development; credentials are read from the
    /// `BINANCE_*` and `BITGET_*` environment variables.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors_origins: vec!["http://localhost:3000".to_string()],
            },
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            exchanges: ExchangesConfig {
                binance: ExchangeConfig {
                    api_key_env: Some("BINANCE_API_KEY".to_string()),
                    api_secret_env: Some("BINANCE_API_SECRET".to_string()),
                    history_delay_ms: 500,
                    ..ExchangeConfig::public("https://api.binance.com", "/logos/binance.svg")
                },
                bybit: ExchangeConfig::public("https://api.bybit.com", "/logos/bybit.svg"),
                okx: ExchangeConfig::public("https://www.okx.com", "/logos/okx.svg"),
                bitget: ExchangeConfig {
                    api_key_env: Some("BITGET_API_KEY".to_string()),
                    api_secret_env: Some("BITGET_API_SECRET".to_string()),
                    passphrase_env: Some("BITGET_PASSPHRASE".to_string()),
                    ..ExchangeConfig::public("https://api.bitget.com", "/logos/bitget.svg")
                },
            },
        }
    }
}

impl ExchangesConfig {
    /// Iterates `(name, config)` pairs in adapter order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ExchangeConfig)> {
        [
            ("binance", &self.binance),
            ("bybit", &self.bybit),
            ("okx", &self.okx),
            ("bitget", &self.bitget),
        ]
        .into_iter()
    }
}
