//! Delta-based CPU usage sampler.

use std::collections::HashMap;

use chrono::Utc;

use crate::accumulator::Accumulator;
use crate::collector::CollectorError;
use crate::collector::host::{CpuTimes, HostStats};
use crate::metric::{Fields, Tags, Value};

/// Measurement of CPU usage gauges.
pub const CPU_USAGE_MEASUREMENT: &str = "cpu_usage";

/// Usage of one CPU entry over the last sampling window.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuUsage {
    pub cpu: String,
    /// Busy percentage, 0–100.
    pub percent: f64,
}

/// CPU usage from the difference between two cumulative samples.
///
/// The first observation only records a baseline. Every later observation
/// reports `100 - 100 * idle_delta / total_delta` per CPU entry and becomes
/// the new baseline.
#[derive(Debug, Default)]
pub struct CpuSampler {
    last: HashMap<String, CpuTimes>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline has been recorded.
    pub fn has_history(&self) -> bool {
        !self.last.is_empty()
    }

    /// Drop the baseline; the next observation emits nothing.
    pub fn reset(&mut self) {
        self.last.clear();
    }

    /// Feed a new sample and compute usage against the previous one.
    ///
    /// Entries without a previous sample, or whose total did not move, are
    /// skipped. The new sample becomes the baseline unless an error is returned.
    ///
    /// # Errors
    /// [`CollectorError::Regression`] if any entry's total went backwards.
    /// Nothing is reported and the previous baseline is kept.
    pub fn observe(&mut self, times: Vec<CpuTimes>) -> Result<Vec<CpuUsage>, CollectorError> {
        if self.last.is_empty() {
            self.store(times);
            return Ok(Vec::new());
        }

        let mut usages = Vec::with_capacity(times.len());
        for current in &times {
            let Some(previous) = self.last.get(&current.cpu) else {
                continue;
            };
            let total_delta = current.total() - previous.total();
            if total_delta < 0.0 {
                return Err(CollectorError::Regression {
                    cpu: current.cpu.clone(),
                    previous: previous.total(),
                    current: current.total(),
                });
            }
            if total_delta == 0.0 {
                continue;
            }
            usages.push(CpuUsage {
                cpu: current.cpu.clone(),
                percent: 100.0 - 100.0 * (current.idle - previous.idle) / total_delta,
            });
        }

        self.store(times);
        Ok(usages)
    }

    /// Fetch a sample from `stats` and emit one `cpu_usage` gauge per entry.
    pub fn gather(
        &mut self,
        stats: &mut dyn HostStats,
        acc: &dyn Accumulator,
    ) -> Result<(), CollectorError> {
        let first = !self.has_history();
        let usages = self.observe(stats.cpu_times()?)?;
        if first {
            tracing::debug!("CPU baseline recorded, usage available from next cycle");
        }

        let now = Utc::now();
        for usage in usages {
            let mut tags = Tags::new();
            tags.insert("cpu".to_owned(), usage.cpu);
            let mut fields = Fields::new();
            fields.insert("value".to_owned(), Value::Float(usage.percent));
            acc.add_gauge(CPU_USAGE_MEASUREMENT, fields, tags, Some(now));
        }
        Ok(())
    }

    fn store(&mut self, times: Vec<CpuTimes>) {
        self.last = times.into_iter().map(|t| (t.cpu.clone(), t)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MemoryAccumulator;
    use crate::collector::host::MemoryStat;
    use crate::metric::MetricKind;

    /// Sample with the given idle and total ticks.
    fn times(idle: f64, total: f64) -> Vec<CpuTimes> {
        vec![CpuTimes {
            cpu: "cpu-total".into(),
            idle,
            user: total - idle,
            ..Default::default()
        }]
    }

    struct Scripted(Vec<Vec<CpuTimes>>);

    impl HostStats for Scripted {
        fn cpu_times(&mut self) -> Result<Vec<CpuTimes>, CollectorError> {
            Ok(self.0.remove(0))
        }

        fn memory(&mut self) -> Result<MemoryStat, CollectorError> {
            Ok(MemoryStat::default())
        }
    }

    #[test]
    fn test_first_observation_emits_nothing() {
        let mut sampler = CpuSampler::new();
        assert!(!sampler.has_history());
        assert!(sampler.observe(times(100.0, 200.0)).unwrap().is_empty());
        assert!(sampler.has_history());
    }

    #[test]
    fn test_second_observation_computes_usage() {
        let mut sampler = CpuSampler::new();
        sampler.observe(times(100.0, 200.0)).unwrap();
        let usages = sampler.observe(times(150.0, 300.0)).unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].cpu, "cpu-total");
        assert!((usages[0].percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_delta_is_skipped_and_baseline_kept_moving() {
        let mut sampler = CpuSampler::new();
        sampler.observe(times(100.0, 200.0)).unwrap();
        assert!(sampler.observe(times(100.0, 200.0)).unwrap().is_empty());
        let usages = sampler.observe(times(190.0, 300.0)).unwrap();
        assert!((usages[0].percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_regression_is_an_error() {
        let mut sampler = CpuSampler::new();
        sampler.observe(times(100.0, 200.0)).unwrap();
        let err = sampler.observe(times(100.0, 195.0)).unwrap_err();
        assert!(matches!(err, CollectorError::Regression { ref cpu, .. } if cpu == "cpu-total"));

        // Baseline was not replaced by the regressed sample.
        let usages = sampler.observe(times(150.0, 300.0)).unwrap();
        assert!((usages[0].percent - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_cpu_is_skipped() {
        let mut sampler = CpuSampler::new();
        sampler.observe(times(100.0, 200.0)).unwrap();
        let mut next = times(150.0, 300.0);
        next[0].cpu = "cpu7".into();
        assert!(sampler.observe(next).unwrap().is_empty());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut sampler = CpuSampler::new();
        sampler.observe(times(100.0, 200.0)).unwrap();
        sampler.reset();
        assert!(sampler.observe(times(150.0, 300.0)).unwrap().is_empty());
    }

    #[test]
    fn test_gather_emits_gauge_from_second_cycle() {
        let mut stats = Scripted(vec![times(100.0, 200.0), times(150.0, 300.0)]);
        let acc = MemoryAccumulator::new();
        let mut sampler = CpuSampler::new();

        sampler.gather(&mut stats, &acc).unwrap();
        assert_eq!(acc.metric_count(), 0);

        sampler.gather(&mut stats, &acc).unwrap();
        let metrics = acc.metrics_named(CPU_USAGE_MEASUREMENT);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].kind, MetricKind::Gauge);
        assert_eq!(metrics[0].tag("cpu"), Some("cpu-total"));
        assert_eq!(metrics[0].field("value"), Some(&Value::Float(50.0)));
    }
}
