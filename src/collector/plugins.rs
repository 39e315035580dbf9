//! SQL Server plugins.
//!
//! - [`CustomMssql`]: Liveness probe and query fan-out; the measurement comes
//!   from each row's `measurement` column
//! - [`NhnRdsMssql`]: Host CPU and memory gauges, then the same fan-out with
//!   aggregated rows named after the plugin

mod custom_mssql;
mod nhn_rds_mssql;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::sqlserver::{Query, SqlDriver, Target};
use crate::collector::{Collector, CollectorError, Schedule};
use crate::config::PluginsConfig;

pub use custom_mssql::CustomMssql;
pub use nhn_rds_mssql::NhnRdsMssql;

/// Connection string used when a plugin block does not list any server.
pub const DEFAULT_SERVER: &str = "Server=.;app name=mssqlmon;log=1;";

fn default_enabled() -> bool {
    true
}

fn default_servers() -> Vec<Target> {
    vec![Target::new(DEFAULT_SERVER)]
}

/// Configuration of one plugin instance.
///
/// Shared by both plugin kinds; the kind is given by the section it appears in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MssqlPluginConfig {
    /// Unique instance name.
    pub name: String,
    /// Enable this instance (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Connection strings. Omitted: the local default instance.
    #[serde(default = "default_servers")]
    pub servers: Vec<Target>,
    /// Scripts to run. Empty: the built-in log backup size script.
    #[serde(default)]
    pub queries: Vec<Query>,
    /// Per-instance gather interval; overrides the agent schedule.
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    /// Per-instance cron expression; overrides the agent schedule.
    #[serde(default)]
    pub cron: Option<String>,
}

impl MssqlPluginConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            servers: default_servers(),
            queries: Vec::new(),
            interval: None,
            cron: None,
        }
    }

    pub fn with_servers<I, T>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        self.servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Queries to run each cycle.
    pub fn effective_queries(&self) -> Vec<Query> {
        if self.queries.is_empty() {
            vec![Query::log_backup_size()]
        } else {
            self.queries.clone()
        }
    }

    /// The instance's own schedule, or `fallback` when it has none.
    ///
    /// # Errors
    /// [`CollectorError::Config`] if both `interval` and `cron` are set or the
    /// cron expression does not parse.
    pub fn schedule(&self, fallback: &Schedule) -> Result<Schedule, CollectorError> {
        match (self.interval, &self.cron) {
            (Some(_), Some(_)) => Err(CollectorError::Config(format!(
                "plugin {}: interval and cron are mutually exclusive",
                self.name
            ))),
            (Some(interval), None) => Ok(Schedule::interval(interval)),
            (None, Some(expr)) => Schedule::cron(expr),
            (None, None) => Ok(fallback.clone()),
        }
    }

    pub(crate) fn warn_if_no_servers(&self, kind: &str) {
        if self.servers.is_empty() {
            tracing::warn!(plugin = %kind, name = %self.name, "Server list is empty");
        }
    }
}

/// Instantiate every enabled plugin.
///
/// Instances without their own schedule use `fallback`.
pub fn build_plugins(
    plugins: &PluginsConfig,
    fallback: &Schedule,
    driver: Arc<dyn SqlDriver>,
) -> Result<Vec<Arc<dyn Collector>>, CollectorError> {
    let mut built: Vec<Arc<dyn Collector>> = Vec::with_capacity(plugins.len());
    for (kind, config) in plugins.iter() {
        if !config.enabled {
            tracing::debug!(plugin = %kind, name = %config.name, "Skipping disabled plugin");
            continue;
        }
        let schedule = config.schedule(fallback)?;
        let driver = Arc::clone(&driver);
        if kind == NhnRdsMssql::PLUGIN_NAME {
            built.push(Arc::new(NhnRdsMssql::new(config, schedule, driver)));
        } else {
            built.push(Arc::new(CustomMssql::new(config, schedule, driver)));
        }
    }
    Ok(built)
}
