//! Concurrent gather across all configured targets.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::accumulator::Accumulator;
use crate::collector::sqlserver::{MeasurementNaming, Query, SqlDriver, Target, check_server, gather_server};
use crate::collector::{CollectorError, GatherErrors};

/// Runs the liveness probe and every query against every target.
///
/// Per cycle: each target is probed in list order, and right after its probe a
/// task is spawned that runs the queries for that target sequentially. All
/// tasks are joined before [`gather`](Self::gather) returns. Tasks share
/// nothing but the accumulator.
pub struct SqlServerGatherer {
    driver: Arc<dyn SqlDriver>,
    targets: Vec<Target>,
    queries: Vec<Query>,
    naming: MeasurementNaming,
}

impl std::fmt::Debug for SqlServerGatherer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerGatherer")
            .field("targets", &self.targets)
            .field("queries", &self.queries.iter().map(|q| &q.script_name).collect::<Vec<_>>())
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

impl SqlServerGatherer {
    pub fn new(
        driver: Arc<dyn SqlDriver>,
        targets: Vec<Target>,
        queries: Vec<Query>,
        naming: MeasurementNaming,
    ) -> Self {
        Self {
            driver,
            targets,
            queries,
            naming,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    /// Run one cycle.
    ///
    /// Never stops early: every probe, query and task failure is collected
    /// into the returned [`GatherErrors`].
    pub async fn gather(&self, acc: &Arc<dyn Accumulator>) -> Result<(), GatherErrors> {
        let mut errors = GatherErrors::new();
        let mut tasks = JoinSet::new();

        for target in &self.targets {
            if let Err(e) = check_server(self.driver.as_ref(), target, acc.as_ref()).await {
                errors.push(e);
            }

            let driver = Arc::clone(&self.driver);
            let acc = Arc::clone(acc);
            let target = target.clone();
            let queries = self.queries.clone();
            let naming = self.naming.clone();
            tasks.spawn(async move {
                let mut failures = Vec::new();
                for query in queries {
                    if let Err(e) =
                        gather_server(driver.as_ref(), &target, query, &naming, acc.as_ref()).await
                    {
                        failures.push(e);
                    }
                }
                failures
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(failures) => errors.extend(failures),
                Err(e) => {
                    tracing::error!(error = %e, "Gather task did not complete");
                    errors.push(CollectorError::Task(e.to_string()));
                }
            }
        }

        tracing::debug!(
            targets = self.targets.len(),
            errors = errors.len(),
            "SQL Server gather finished"
        );
        errors.into_result()
    }
}
