//! Host statistics collectors.
//!
//! - [`HostStats`]: source of cumulative CPU times and memory counters
//! - [`SystemHostStats`]: Linux implementation (`/proc/stat` + `sysinfo`)
//! - [`CpuSampler`]: delta-based CPU usage, keeps the previous sample per CPU
//! - [`MemorySampler`]: memory usage percentage

mod cpu;
mod memory;
mod stats;

pub use cpu::{CPU_USAGE_MEASUREMENT, CpuSampler, CpuUsage};
pub use memory::{MEMORY_USAGE_FIELD, MemorySampler, memory_usage_percent};
pub use stats::{CpuTimes, HostStats, MemoryStat, SystemHostStats, parse_proc_stat};
