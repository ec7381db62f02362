//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for the login engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client settings.
    pub http: HttpConfig,
    /// State persistence windows.
    pub state: StateConfig,
    /// App-validation polling settings.
    pub polling: PollingConfig,
    /// Transient-error retry settings.
    pub retry: RetryConfig,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("relogin/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Default persistence windows, used when a flow does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// How long a dumped state stays reusable.
    #[serde(with = "humantime_serde")]
    pub state_duration: Duration,
    /// How long a completed second factor exempts the login from a new
    /// challenge.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub twofa_duration: Option<Duration>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_duration: Duration::from_secs(10 * 60),
            // 90 days, the usual SCA exemption window.
            twofa_duration: Some(Duration::from_secs(90 * 24 * 3600)),
        }
    }
}

/// App-validation polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed delay between status checks.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Wall-clock budget for the whole validation.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Optional hard cap on status checks, on top of the wall-clock budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_checks: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(5 * 60),
            max_checks: None,
        }
    }
}

/// Transient-error retry settings. The engine retries exactly once, on a
/// "too many requests" response only; everything else propagates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Fixed backoff before the single retry.
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a builder for configuration.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Set the state reuse window.
    pub fn state_duration(mut self, duration: Duration) -> Self {
        self.config.state.state_duration = duration;
        self
    }

    /// Set the second-factor exemption window.
    pub fn twofa_duration(mut self, duration: Option<Duration>) -> Self {
        self.config.state.twofa_duration = duration;
        self
    }

    /// Set the polling interval.
    pub fn polling_interval(mut self, interval: Duration) -> Self {
        self.config.polling.interval = interval;
        self
    }

    /// Set the polling wall-clock budget.
    pub fn polling_timeout(mut self, timeout: Duration) -> Self {
        self.config.polling.timeout = timeout;
        self
    }

    /// Set the fixed backoff used before the single 429 retry.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry.backoff = backoff;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}
