//! Collector registry for managing plugin schedules.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::accumulator::Accumulator;
use crate::collector::{Collector, CollectorError, Schedule};

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata about a registered job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job UUID.
    pub id: uuid::Uuid,
    /// Plugin instance name.
    pub name: String,
    /// Plugin kind.
    pub category: String,
    /// Schedule description.
    pub schedule: String,
}

/// Runs every registered plugin on its schedule.
///
/// Uses `tokio-cron-scheduler`; each tick runs one gather cycle into the
/// shared accumulator.
pub struct CollectorRegistry {
    scheduler: JobScheduler,
    jobs: Arc<RwLock<HashMap<uuid::Uuid, JobInfo>>>,
    acc: Arc<dyn Accumulator>,
}

impl CollectorRegistry {
    /// Create a new collector registry.
    pub async fn new(acc: Arc<dyn Accumulator>) -> Result<Self, CollectorError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            acc,
        })
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field(
                "job_count",
                &self.jobs.try_read().map(|j| j.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

impl CollectorRegistry {
    /// Register a plugin and schedule its gather cycles.
    pub async fn spawn(&self, collector: Arc<dyn Collector>) -> Result<uuid::Uuid, CollectorError> {
        let name = collector.name().to_string();
        let category = collector.category().to_string();
        let schedule_desc = collector.schedule().to_string();

        let job = self.create_job(Arc::clone(&collector)).inspect_err(|e| {
            tracing::error!(collector = %name, schedule = %schedule_desc, error = %e, "Job create failed");
        })?;

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))
            .inspect_err(|e| {
                tracing::error!(collector = %name, error = %e, "Job register failed");
            })?;

        self.jobs.write().await.insert(
            job_id,
            JobInfo {
                id: job_id,
                name: name.clone(),
                category: category.clone(),
                schedule: schedule_desc.clone(),
            },
        );

        tracing::info!(
            collector = %name,
            category = %category,
            schedule = %schedule_desc,
            job_id = %job_id,
            "Collector registered"
        );
        Ok(job_id)
    }

    /// Start the scheduler.
    pub async fn start(&self) -> Result<(), CollectorError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))?;
        tracing::info!("Collector scheduler started");
        Ok(())
    }

    /// List all registered jobs.
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Gracefully shutdown the scheduler with default timeout.
    pub async fn shutdown(self) -> Result<(), CollectorError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown with custom timeout.
    pub async fn shutdown_with_timeout(mut self, timeout: Duration) -> Result<(), CollectorError> {
        let job_count = self.jobs.read().await.len();
        let shutdown_result = tokio::time::timeout(timeout, async {
            self.scheduler
                .shutdown()
                .await
                .map_err(|e| CollectorError::Scheduler(e.to_string()))
        })
        .await;

        match shutdown_result {
            Ok(Ok(())) => {
                tracing::info!(job_count, "Collector scheduler shutdown complete");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(job_count, error = %e, "Collector scheduler shutdown failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(job_count, "Collector scheduler shutdown timed out");
                Ok(())
            }
        }
    }

    /// Remove a specific collector job by ID.
    pub async fn remove(&self, job_id: &uuid::Uuid) -> Result<(), CollectorError> {
        self.scheduler
            .remove(job_id)
            .await
            .map_err(|e| CollectorError::Scheduler(e.to_string()))
            .inspect_err(|e| tracing::error!(job_id = %job_id, error = %e, "Job remove failed"))?;

        let removed = self.jobs.write().await.remove(job_id);
        tracing::info!(
            job_id = %job_id,
            collector = removed.as_ref().map(|j| j.name.as_str()).unwrap_or("unknown"),
            "Collector removed"
        );
        Ok(())
    }

    // --- Private helpers ---

    fn create_job(&self, collector: Arc<dyn Collector>) -> Result<Job, CollectorError> {
        let acc = Arc::clone(&self.acc);
        let schedule = collector.schedule().clone();

        let make_callback = move || {
            let (collector, acc) = (Arc::clone(&collector), Arc::clone(&acc));
            move |_: uuid::Uuid, _: JobScheduler| {
                let (collector, acc) = (Arc::clone(&collector), Arc::clone(&acc));
                Box::pin(async move { run_collection(collector.as_ref(), acc).await })
                    as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
            }
        };

        match &schedule {
            Schedule::Interval(d) => Job::new_repeated_async(*d, make_callback()),
            Schedule::Cron(expr) => Job::new_cron_job_async(expr, make_callback()),
        }
        .map_err(|e| CollectorError::Scheduler(e.to_string()))
    }
}

/// Execute a single gather cycle and record its outcome.
///
/// A failed cycle is logged and its error handed to the accumulator.
pub async fn run_collection(collector: &dyn Collector, acc: Arc<dyn Accumulator>) {
    let start = Instant::now();
    let name = collector.name();
    tracing::debug!(collector = %name, "Running collection");

    let result = collector.gather(Arc::clone(&acc)).await;
    let duration_ms = start.elapsed().as_millis();

    match result {
        Ok(()) => tracing::debug!(collector = %name, duration_ms, "Collection succeeded"),
        Err(e) => {
            tracing::error!(collector = %name, duration_ms, error = %e, "Collection failed");
            acc.add_error(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MemoryAccumulator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A mock collector for testing.
    struct MockCollector {
        name: String,
        schedule: Schedule,
        fail: bool,
        runs: AtomicUsize,
    }

    impl MockCollector {
        fn new(name: impl Into<String>, fail: bool) -> Self {
            Self {
                name: name.into(),
                schedule: Schedule::interval(Duration::from_secs(60)),
                fail,
                runs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Collector for MockCollector {
        fn name(&self) -> &str {
            &self.name
        }

        fn category(&self) -> &str {
            "test"
        }

        fn schedule(&self) -> &Schedule {
            &self.schedule
        }

        async fn gather(&self, _acc: Arc<dyn Accumulator>) -> Result<(), CollectorError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CollectorError::HostStat("mock failure".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_registry_lifecycle() {
        let acc: Arc<dyn Accumulator> = Arc::new(MemoryAccumulator::new());
        let registry = CollectorRegistry::new(acc).await.unwrap();

        let job_id = registry
            .spawn(Arc::new(MockCollector::new("test-collector", false)))
            .await
            .unwrap();
        assert_eq!(registry.job_count().await, 1);

        let jobs = registry.list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "test-collector");
        assert_eq!(jobs[0].category, "test");
        assert!(jobs[0].schedule.contains("60s"));

        registry.remove(&job_id).await.unwrap();
        assert_eq!(registry.job_count().await, 0);

        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_collection_forwards_cycle_error() {
        let mem = Arc::new(MemoryAccumulator::new());
        let acc: Arc<dyn Accumulator> = mem.clone();

        let ok = MockCollector::new("ok", false);
        run_collection(&ok, Arc::clone(&acc)).await;
        assert_eq!(ok.runs.load(Ordering::SeqCst), 1);
        assert_eq!(mem.error_count(), 0);

        let failing = MockCollector::new("failing", true);
        run_collection(&failing, acc).await;
        assert_eq!(mem.error_messages(), vec!["host stats error: mock failure"]);
    }

    #[tokio::test]
    async fn test_spawn_cron_schedule() {
        let acc: Arc<dyn Accumulator> = Arc::new(MemoryAccumulator::new());
        let registry = CollectorRegistry::new(acc).await.unwrap();

        let mut collector = MockCollector::new("cron", false);
        collector.schedule = Schedule::cron("0 */5 * * * *").unwrap();
        registry.spawn(Arc::new(collector)).await.unwrap();

        let jobs = registry.list_jobs().await;
        assert_eq!(jobs[0].schedule, "cron: 0 */5 * * * *");
        registry.shutdown().await.unwrap();
    }
}
