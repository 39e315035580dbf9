//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::accumulator::OutputFormat;
use crate::collector::Schedule;
use crate::collector::sqlserver::DEFAULT_CONNECT_TIMEOUT;

use super::plugin::PluginsConfig;
use super::validation::ConfigError;

/// Default gather interval (10 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

// =============================================================================
// Agent Configuration
// =============================================================================

/// Agent-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Gather interval for plugins without their own schedule (default: 10s).
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,

    /// Cron expression used instead of `interval`.
    #[serde(default)]
    pub cron: Option<String>,

    /// TCP connect timeout per session (default: 5s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Metric output encoding on stdout (default: influx).
    #[serde(default)]
    pub output: OutputFormat,

    /// Directory with additional plugin config files.
    #[serde(default)]
    pub plugin_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval: None,
            cron: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            output: OutputFormat::default(),
            plugin_dir: None,
        }
    }
}

impl AgentConfig {
    /// Default schedule for plugins.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` on a bad cron expression or when
    /// both `interval` and `cron` are set.
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        match (self.interval, &self.cron) {
            (Some(_), Some(_)) => Err(ConfigError::ValidationError(
                "agent: cannot specify both interval and cron".to_string(),
            )),
            (interval, None) => Ok(Schedule::interval(interval.unwrap_or(DEFAULT_INTERVAL))),
            (None, Some(expr)) => Schedule::cron(expr)
                .map_err(|e| ConfigError::ValidationError(format!("agent: {e}"))),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent-wide settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Plugin instances grouped by kind.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// Connection strings have `${VAR}` references expanded.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        config.plugins.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration including the `plugin_dir` directory.
    pub fn load_with_plugin_dir(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;

        if let Some(ref dir) = config.agent.plugin_dir {
            let mut extra = PluginsConfig::load_from_dir(dir)?;
            extra.expand_env()?;
            config.plugins = config.plugins.merge(extra);
            config.validate()?;
        }

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agent.schedule()?;

        if self.agent.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "agent connect_timeout must be positive".to_string(),
            ));
        }

        self.plugins.validate()?;

        Ok(())
    }

    /// Replace the agent schedule with a fixed interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.agent.interval = Some(interval);
        self.agent.cron = None;
        self
    }
}
