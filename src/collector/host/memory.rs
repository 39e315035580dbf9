//! Memory usage sampler.

use chrono::Utc;

use crate::accumulator::Accumulator;
use crate::collector::CollectorError;
use crate::collector::host::{HostStats, MemoryStat};
use crate::metric::{Fields, Tags, Value};

/// Field holding the memory usage percentage.
pub const MEMORY_USAGE_FIELD: &str = "memory_usage";

/// `100 - 100 * available / total`.
///
/// # Errors
/// [`CollectorError::HostStat`] if total memory is reported as zero.
pub fn memory_usage_percent(stat: MemoryStat) -> Result<f64, CollectorError> {
    if stat.total == 0 {
        return Err(CollectorError::HostStat(
            "error getting virtual memory info: total memory is zero".to_string(),
        ));
    }
    Ok(100.0 - 100.0 * stat.available as f64 / stat.total as f64)
}

/// Emits one `memory_usage` gauge per call under a configured measurement.
#[derive(Debug, Clone)]
pub struct MemorySampler {
    measurement: String,
}

impl MemorySampler {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
        }
    }

    pub fn gather(
        &self,
        stats: &mut dyn HostStats,
        acc: &dyn Accumulator,
    ) -> Result<(), CollectorError> {
        let usage = memory_usage_percent(stats.memory()?)?;

        let mut fields = Fields::new();
        fields.insert(MEMORY_USAGE_FIELD.to_owned(), Value::Float(usage));
        acc.add_gauge(&self.measurement, fields, Tags::new(), Some(Utc::now()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MemoryAccumulator;
    use crate::collector::host::CpuTimes;

    struct FixedMemory(MemoryStat);

    impl HostStats for FixedMemory {
        fn cpu_times(&mut self) -> Result<Vec<CpuTimes>, CollectorError> {
            Ok(Vec::new())
        }

        fn memory(&mut self) -> Result<MemoryStat, CollectorError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_memory_usage_percent() {
        let usage = memory_usage_percent(MemoryStat {
            total: 1000,
            available: 250,
        })
        .unwrap();
        assert!((usage - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_memory_usage_zero_total() {
        let err = memory_usage_percent(MemoryStat::default()).unwrap_err();
        assert!(matches!(err, CollectorError::HostStat(_)));
    }

    #[test]
    fn test_gather_emits_single_gauge() {
        let mut stats = FixedMemory(MemoryStat {
            total: 400,
            available: 100,
        });
        let acc = MemoryAccumulator::new();
        MemorySampler::new("nhn_rds_mssql")
            .gather(&mut stats, &acc)
            .unwrap();

        let metrics = acc.metrics();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].measurement, "nhn_rds_mssql");
        assert_eq!(metrics[0].field(MEMORY_USAGE_FIELD), Some(&Value::Float(75.0)));
    }
}
