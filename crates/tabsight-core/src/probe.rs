//! Process and system counters read from the OS.
//!
//! [`ProcessProbe`] is the enumeration seam the aggregator samples through;
//! [`ProcfsProbe`] reads Linux `/proc`. Every reading is best-effort:
//! per-process failures come back as [`ProcessAccessError`] and are the
//! caller's to skip.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EnumerationError, ProcessAccessError};

/// Cumulative network byte counters summed over all interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Cumulative CPU time counters for the whole machine, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

/// Machine-wide readings taken once per tick. Cumulative counters are
/// `None` when they could not be read, so a failed read is never mistaken
/// for a zero baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemCounters {
    pub memory_used_bytes: u64,
    pub cpu: Option<CpuTimes>,
    pub net: Option<NetCounters>,
}

/// Enumeration and per-process inspection primitives.
pub trait ProcessProbe: Send {
    /// All live process ids. An error here means nothing could be listed.
    fn pids(&self) -> Result<Vec<u32>, EnumerationError>;

    fn name(&self, pid: u32) -> Result<String, ProcessAccessError>;

    /// Unique set size: pages owned by this process alone.
    fn unique_memory(&self, pid: u32) -> Result<u64, ProcessAccessError>;

    /// Resident set size, including shared pages.
    fn resident_memory(&self, pid: u32) -> Result<u64, ProcessAccessError>;

    /// Cumulative user + system CPU time in ticks.
    fn cpu_ticks(&self, pid: u32) -> Result<u64, ProcessAccessError>;

    /// Ticks per second for [`Self::cpu_ticks`].
    fn ticks_per_second(&self) -> f64;

    fn system(&self) -> SystemCounters;
}

/// Which accounting method produced a memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMethod {
    Uss,
    Rss,
}

/// Memory of one process, tagged with how it was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub method: MemoryMethod,
    pub bytes: u64,
}

/// Two-tier memory accounting: unique memory when the OS allows it,
/// resident memory when unique memory is access-denied. Any other
/// failure (including the process vanishing) is returned as-is.
pub fn measure_memory<P: ProcessProbe + ?Sized>(
    probe: &P,
    pid: u32,
) -> Result<MemoryReading, ProcessAccessError> {
    match probe.unique_memory(pid) {
        Ok(bytes) => Ok(MemoryReading {
            method: MemoryMethod::Uss,
            bytes,
        }),
        Err(ProcessAccessError::Denied { .. }) => {
            let bytes = probe.resident_memory(pid)?;
            Ok(MemoryReading {
                method: MemoryMethod::Rss,
                bytes,
            })
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// procfs
// ---------------------------------------------------------------------------

/// Linux `/proc` reader.
#[derive(Debug, Clone)]
pub struct ProcfsProbe {
    root: PathBuf,
    page_size: u64,
    clk_tck: f64,
}

impl ProcfsProbe {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Read from a different procfs mount (e.g. a fixture directory).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        // SAFETY: `sysconf` is thread-safe for these queries and has no side effects.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        // SAFETY: as above.
        let clk_tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        Self {
            root: root.into(),
            page_size: if page_size > 0 { page_size as u64 } else { 4096 },
            clk_tck: if clk_tck > 0 { clk_tck as f64 } else { 100.0 },
        }
    }

    fn pid_file(&self, pid: u32, name: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(name)
    }

    fn read_pid_file(&self, pid: u32, name: &str) -> Result<String, ProcessAccessError> {
        std::fs::read_to_string(self.pid_file(pid, name))
            .map_err(|e| ProcessAccessError::from_io(pid, e))
    }

    fn read(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.root.join(name)).ok()
    }
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn malformed(pid: u32, what: &str) -> ProcessAccessError {
    ProcessAccessError::Io {
        pid,
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, format!("malformed {what}")),
    }
}

/// Sum of the `Private_*` lines of `smaps_rollup`, in bytes.
pub(crate) fn parse_smaps_rollup_uss(raw: &str) -> Option<u64> {
    let mut total_kb = 0u64;
    let mut found = false;
    for line in raw.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        if !matches!(key, "Private_Clean" | "Private_Dirty" | "Private_Hugetlb") {
            continue;
        }
        let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
        total_kb += kb;
        found = true;
    }
    found.then_some(total_kb * 1024)
}

/// `utime + stime` from `/proc/<pid>/stat`. The command name may contain
/// spaces and parentheses, so fields are counted from the last `)`.
pub(crate) fn parse_stat_ticks(raw: &str) -> Option<u64> {
    let after = &raw[raw.rfind(')')? + 1..];
    let fields: Vec<&str> = after.split_whitespace().collect();
    // After the name: state is field 3, utime field 14, stime field 15.
    let utime = fields.get(11)?.parse::<u64>().ok()?;
    let stime = fields.get(12)?.parse::<u64>().ok()?;
    Some(utime + stime)
}

/// `MemTotal - MemAvailable`, in bytes.
pub(crate) fn parse_meminfo_used(raw: &str) -> Option<u64> {
    let mut total = None;
    let mut available = None;
    for line in raw.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest.split_whitespace().next().and_then(|v| v.parse::<u64>().ok());
        match key {
            "MemTotal" => total = value,
            "MemAvailable" => available = value,
            _ => {}
        }
    }
    Some(total?.saturating_sub(available?) * 1024)
}

/// Aggregate `cpu ` line of `/proc/stat`. Idle time is `idle + iowait`.
pub(crate) fn parse_cpu_times(raw: &str) -> Option<CpuTimes> {
    let line = raw.lines().find_map(|l| l.strip_prefix("cpu "))?;
    let parts: Vec<u64> = line
        .split_whitespace()
        .filter_map(|s| s.parse::<u64>().ok())
        .collect();
    if parts.len() < 4 {
        return None;
    }
    // guest and guest_nice are already counted in user and nice.
    let total: u64 = parts.iter().take(8).sum();
    let idle = parts[3] + parts.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Byte counters of `/proc/net/dev`, summed over every interface.
pub(crate) fn parse_net_dev(raw: &str) -> Option<NetCounters> {
    let mut counters = NetCounters::default();
    let mut seen = false;
    for line in raw.lines().skip(2) {
        let Some((_, stats)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<u64> = stats
            .split_whitespace()
            .filter_map(|s| s.parse::<u64>().ok())
            .collect();
        if fields.len() < 16 {
            continue;
        }
        counters.bytes_recv += fields[0];
        counters.bytes_sent += fields[8];
        seen = true;
    }
    seen.then_some(counters)
}

impl ProcessProbe for ProcfsProbe {
    fn pids(&self) -> Result<Vec<u32>, EnumerationError> {
        let mut pids: Vec<u32> = std::fs::read_dir(&self.root)?
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn name(&self, pid: u32) -> Result<String, ProcessAccessError> {
        Ok(self.read_pid_file(pid, "comm")?.trim().to_string())
    }

    fn unique_memory(&self, pid: u32) -> Result<u64, ProcessAccessError> {
        let raw = self.read_pid_file(pid, "smaps_rollup")?;
        parse_smaps_rollup_uss(&raw).ok_or_else(|| malformed(pid, "smaps_rollup"))
    }

    fn resident_memory(&self, pid: u32) -> Result<u64, ProcessAccessError> {
        let raw = self.read_pid_file(pid, "statm")?;
        let pages = raw
            .split_whitespace()
            .nth(1)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| malformed(pid, "statm"))?;
        Ok(pages * self.page_size)
    }

    fn cpu_ticks(&self, pid: u32) -> Result<u64, ProcessAccessError> {
        let raw = self.read_pid_file(pid, "stat")?;
        parse_stat_ticks(&raw).ok_or_else(|| malformed(pid, "stat"))
    }

    fn ticks_per_second(&self) -> f64 {
        self.clk_tck
    }

    fn system(&self) -> SystemCounters {
        SystemCounters {
            memory_used_bytes: self
                .read("meminfo")
                .as_deref()
                .and_then(parse_meminfo_used)
                .unwrap_or(0),
            cpu: self.read("stat").as_deref().and_then(parse_cpu_times),
            net: self.read("net/dev").as_deref().and_then(parse_net_dev),
        }
    }
}

/// Whether a procfs mount is readable at `root`.
pub fn procfs_available(root: &Path) -> bool {
    root.join("stat").exists()
}
