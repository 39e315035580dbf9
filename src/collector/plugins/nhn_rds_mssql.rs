//! `nhn_rds_mssql` plugin.

use std::sync::{Arc, Mutex};

use crate::accumulator::Accumulator;
use crate::collector::host::{CpuSampler, HostStats, MemorySampler, SystemHostStats};
use crate::collector::plugins::MssqlPluginConfig;
use crate::collector::sqlserver::{MeasurementNaming, SqlDriver, SqlServerGatherer, Target};
use crate::collector::{Collector, CollectorError, Schedule};

/// Host counters and the CPU baseline they are compared against.
struct HostSampler {
    stats: Box<dyn HostStats>,
    cpu: CpuSampler,
}

/// Host CPU and memory gauges followed by the SQL Server fan-out.
///
/// Each cycle runs, in order: the CPU sampler, the memory sampler, then the
/// liveness probe and scripts for every server. Aggregated rows are always
/// named after the plugin. A CPU counter regression is returned as the cycle
/// error once the rest of the cycle has run.
pub struct NhnRdsMssql {
    name: String,
    schedule: Schedule,
    host: Mutex<HostSampler>,
    memory: MemorySampler,
    gatherer: SqlServerGatherer,
}

impl NhnRdsMssql {
    /// Plugin kind, also the measurement of aggregated rows and memory gauges.
    pub const PLUGIN_NAME: &'static str = "nhn_rds_mssql";

    /// Create the plugin reading counters of the local host.
    pub fn new(config: &MssqlPluginConfig, schedule: Schedule, driver: Arc<dyn SqlDriver>) -> Self {
        Self::with_host_stats(config, schedule, driver, Box::new(SystemHostStats::new()))
    }

    /// Create the plugin with a custom counter source.
    pub fn with_host_stats(
        config: &MssqlPluginConfig,
        schedule: Schedule,
        driver: Arc<dyn SqlDriver>,
        stats: Box<dyn HostStats>,
    ) -> Self {
        config.warn_if_no_servers(Self::PLUGIN_NAME);
        let gatherer = SqlServerGatherer::new(
            driver,
            config.servers.clone(),
            config.effective_queries(),
            MeasurementNaming::Fixed(Self::PLUGIN_NAME.to_owned()),
        );

        Self {
            name: config.name.clone(),
            schedule,
            host: Mutex::new(HostSampler {
                stats,
                cpu: CpuSampler::new(),
            }),
            memory: MemorySampler::new(Self::PLUGIN_NAME),
            gatherer,
        }
    }

    pub fn targets(&self) -> &[Target] {
        self.gatherer.targets()
    }

    /// Run the CPU and memory samplers. Memory failures go to the error sink.
    fn gather_host(&self, acc: &dyn Accumulator) -> Result<(), CollectorError> {
        let mut host = self
            .host
            .lock()
            .map_err(|_| CollectorError::HostStat("host sampler lock poisoned".to_string()))?;
        let HostSampler { stats, cpu } = &mut *host;

        let cpu_result = cpu.gather(stats.as_mut(), acc);
        if let Err(e) = &cpu_result {
            tracing::warn!(plugin = %self.name, error = %e, "CPU usage sample rejected");
        }

        if let Err(e) = self.memory.gather(stats.as_mut(), acc) {
            tracing::warn!(plugin = %self.name, error = %e, "Memory usage unavailable");
            acc.add_error(e);
        }
        cpu_result
    }
}

impl std::fmt::Debug for NhnRdsMssql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NhnRdsMssql")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("gatherer", &self.gatherer)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for NhnRdsMssql {
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
        // Lock is released before any await.
        let host_result = self.gather_host(acc.as_ref());

        if let Err(errors) = self.gatherer.gather(&acc).await {
            tracing::debug!(plugin = %self.name, errors = errors.len(), "Forwarding gather errors");
            errors.report(acc.as_ref());
        }
        host_result
    }
}
