//! Host statistic sources.

use std::path::PathBuf;

use sysinfo::System;

use crate::collector::CollectorError;

/// Default location of the kernel CPU counters.
const PROC_STAT: &str = "/proc/stat";

/// Name given to the aggregate `cpu` line of `/proc/stat`.
const CPU_TOTAL: &str = "cpu-total";

/// Cumulative CPU time buckets for one CPU entry, in kernel ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuTimes {
    /// Entry name, e.g. `cpu-total` or `cpu3`.
    pub cpu: String,
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
}

impl CpuTimes {
    /// Sum of all buckets.
    pub fn total(&self) -> f64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

/// Virtual memory counters, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStat {
    pub total: u64,
    pub available: u64,
}

/// Provider of host counters.
pub trait HostStats: Send {
    /// Cumulative CPU times. The aggregate entry is named `cpu-total`.
    fn cpu_times(&mut self) -> Result<Vec<CpuTimes>, CollectorError>;

    /// Current memory counters.
    fn memory(&mut self) -> Result<MemoryStat, CollectorError>;
}

/// Host counters of the local machine.
///
/// CPU times come from `/proc/stat` (aggregate line only); memory comes from
/// `sysinfo`.
pub struct SystemHostStats {
    system: System,
    proc_stat: PathBuf,
}

impl std::fmt::Debug for SystemHostStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemHostStats")
            .field("proc_stat", &self.proc_stat)
            .finish_non_exhaustive()
    }
}

impl Default for SystemHostStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemHostStats {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            proc_stat: PathBuf::from(PROC_STAT),
        }
    }

    /// Read CPU counters from another file (used by tests).
    pub fn with_proc_stat(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_stat = path.into();
        self
    }
}

impl HostStats for SystemHostStats {
    fn cpu_times(&mut self) -> Result<Vec<CpuTimes>, CollectorError> {
        let content = std::fs::read_to_string(&self.proc_stat).map_err(|e| {
            CollectorError::HostStat(format!(
                "failed to read {}: {e}",
                self.proc_stat.display()
            ))
        })?;
        let times: Vec<CpuTimes> = parse_proc_stat(&content)
            .into_iter()
            .filter(|t| t.cpu == CPU_TOTAL)
            .collect();
        if times.is_empty() {
            return Err(CollectorError::HostStat(format!(
                "no aggregate cpu line in {}",
                self.proc_stat.display()
            )));
        }
        Ok(times)
    }

    fn memory(&mut self) -> Result<MemoryStat, CollectorError> {
        self.system.refresh_memory();
        Ok(MemoryStat {
            total: self.system.total_memory(),
            available: self.system.available_memory(),
        })
    }
}

/// Parse the `cpu*` lines of `/proc/stat`.
///
/// Format: `cpu0 user nice system idle iowait irq softirq steal ...`. The
/// aggregate `cpu` line is renamed `cpu-total`. Lines with fewer than four
/// counters are skipped; missing trailing counters read as zero.
pub fn parse_proc_stat(content: &str) -> Vec<CpuTimes> {
    content.lines().filter_map(parse_cpu_line).collect()
}

fn parse_cpu_line(line: &str) -> Option<CpuTimes> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    if !name.starts_with("cpu") {
        return None;
    }

    let counters: Vec<f64> = parts.map_while(|p| p.parse().ok()).collect();
    if counters.len() < 4 {
        return None;
    }
    let at = |i: usize| counters.get(i).copied().unwrap_or(0.0);

    Some(CpuTimes {
        cpu: if name == "cpu" { CPU_TOTAL.to_string() } else { name.to_string() },
        user: at(0),
        nice: at(1),
        system: at(2),
        idle: at(3),
        iowait: at(4),
        irq: at(5),
        softirq: at(6),
        steal: at(7),
    })
}
