//! `custom_mssql` plugin.

use std::sync::Arc;

use crate::accumulator::Accumulator;
use crate::collector::plugins::MssqlPluginConfig;
use crate::collector::sqlserver::{MeasurementNaming, SqlDriver, SqlServerGatherer, Target};
use crate::collector::{Collector, CollectorError, Schedule};

/// Probe each server, then run the configured scripts against it.
///
/// Aggregated rows take their measurement from the `measurement` column and
/// fall back to the plugin name when the column is missing or empty.
/// Per-target failures go to the accumulator's error sink; a cycle never fails.
pub struct CustomMssql {
    name: String,
    schedule: Schedule,
    gatherer: SqlServerGatherer,
}

impl CustomMssql {
    /// Plugin kind.
    pub const PLUGIN_NAME: &'static str = "custom_mssql";

    pub fn new(config: &MssqlPluginConfig, schedule: Schedule, driver: Arc<dyn SqlDriver>) -> Self {
        config.warn_if_no_servers(Self::PLUGIN_NAME);
        let gatherer = SqlServerGatherer::new(
            driver,
            config.servers.clone(),
            config.effective_queries(),
            MeasurementNaming::Column {
                default: Self::PLUGIN_NAME.to_owned(),
            },
        );

        Self {
            name: config.name.clone(),
            schedule,
            gatherer,
        }
    }

    pub fn targets(&self) -> &[Target] {
        self.gatherer.targets()
    }
}

impl std::fmt::Debug for CustomMssql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomMssql")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("gatherer", &self.gatherer)
            .finish()
    }
}

#[async_trait::async_trait]
impl Collector for CustomMssql {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        Self::PLUGIN_NAME
    }

    fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    async fn gather(&self, acc: Arc<dyn Accumulator>) -> Result<(), CollectorError> {
        if let Err(errors) = self.gatherer.gather(&acc).await {
            tracing::debug!(plugin = %self.name, errors = errors.len(), "Forwarding gather errors");
            errors.report(acc.as_ref());
        }
        Ok(())
    }
}
