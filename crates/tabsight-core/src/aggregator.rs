//! Periodic resource snapshots of a target application.
//!
//! Each tick enumerates live processes, keeps those whose name contains the
//! target (case-insensitive), and sums their memory and CPU. Machine-wide
//! memory, CPU and network deltas ride along. One snapshot is emitted per
//! tick, even when nothing matched.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::error::{AggregateError, EnumerationError, ProcessAccessError};
use crate::probe::{CpuTimes, MemoryMethod, NetCounters, ProcessProbe, measure_memory};
use crate::sink::{RecordKind, TelemetrySink};

/// Payload `type` of resource records.
pub const RESOURCE_USAGE_TYPE: &str = "resourceUsage";

/// How the network deltas of a snapshot relate to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetDeltaStatus {
    /// First tick: there is nothing to diff against, deltas are absent.
    NoPriorSample,
    Ok,
    /// A cumulative counter went backwards; deltas were clamped to zero.
    CounterReset,
    /// The counters could not be read this tick; deltas are absent and the
    /// next readable tick starts over from `NoPriorSample`.
    Unavailable,
}

/// Aggregated resource usage for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub target: String,
    pub aggregate_memory_bytes: u64,
    /// Sum over matched processes; may exceed 100.
    pub aggregate_cpu_percent: f64,
    pub process_count: u32,
    pub uss_processes: u32,
    pub rss_processes: u32,
    /// Matched processes that vanished or refused inspection mid-tick.
    pub skipped_processes: u32,
    pub system_memory_used_bytes: u64,
    pub system_cpu_percent: f64,
    pub net_sent_delta_bytes: Option<u64>,
    pub net_recv_delta_bytes: Option<u64>,
    pub net_status: NetDeltaStatus,
}

impl ResourceSnapshot {
    /// Log payload: the snapshot fields plus `"type": "resourceUsage"`.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert("type".to_string(), RESOURCE_USAGE_TYPE.into());
        }
        value
    }
}

/// Case-insensitive substring match on process names.
#[derive(Debug, Clone)]
pub struct TargetMatcher {
    needle: String,
}

impl TargetMatcher {
    pub fn new(target: &str) -> Self {
        Self {
            needle: target.to_lowercase(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.to_lowercase().contains(&self.needle)
    }

    pub fn target(&self) -> &str {
        &self.needle
    }
}

/// Network delta between two cumulative readings.
pub fn net_delta(
    previous: Option<NetCounters>,
    current: NetCounters,
) -> (Option<u64>, Option<u64>, NetDeltaStatus) {
    let Some(prev) = previous else {
        return (None, None, NetDeltaStatus::NoPriorSample);
    };
    let reset = current.bytes_sent < prev.bytes_sent || current.bytes_recv < prev.bytes_recv;
    let status = if reset {
        NetDeltaStatus::CounterReset
    } else {
        NetDeltaStatus::Ok
    };
    (
        Some(current.bytes_sent.saturating_sub(prev.bytes_sent)),
        Some(current.bytes_recv.saturating_sub(prev.bytes_recv)),
        status,
    )
}

fn cpu_percent(previous: Option<CpuTimes>, current: CpuTimes) -> f64 {
    let Some(prev) = previous else {
        return 0.0;
    };
    let total = current.total.saturating_sub(prev.total);
    if total == 0 {
        return 0.0;
    }
    let busy = current.busy.saturating_sub(prev.busy);
    (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy)]
struct CpuSample {
    ticks: u64,
    at: Instant,
}

/// Stateful sampler: remembers the previous tick's counters.
pub struct ResourceAggregator<P: ProcessProbe> {
    probe: P,
    matcher: TargetMatcher,
    cpu_samples: HashMap<u32, CpuSample>,
    last_system_cpu: Option<CpuTimes>,
    last_net: Option<NetCounters>,
}

impl<P: ProcessProbe> ResourceAggregator<P> {
    pub fn new(probe: P, target: &str) -> Self {
        Self {
            probe,
            matcher: TargetMatcher::new(target),
            cpu_samples: HashMap::new(),
            last_system_cpu: None,
            last_net: None,
        }
    }

    /// Take one snapshot now.
    pub fn tick(&mut self) -> Result<ResourceSnapshot, EnumerationError> {
        self.tick_at(Instant::now())
    }

    /// Take one snapshot, treating `now` as the sample time.
    pub fn tick_at(&mut self, now: Instant) -> Result<ResourceSnapshot, EnumerationError> {
        let mut pids = self.probe.pids()?;
        pids.sort_unstable();
        pids.dedup();

        let mut snapshot = ResourceSnapshot {
            target: self.matcher.target().to_string(),
            aggregate_memory_bytes: 0,
            aggregate_cpu_percent: 0.0,
            process_count: 0,
            uss_processes: 0,
            rss_processes: 0,
            skipped_processes: 0,
            system_memory_used_bytes: 0,
            system_cpu_percent: 0.0,
            net_sent_delta_bytes: None,
            net_recv_delta_bytes: None,
            net_status: NetDeltaStatus::NoPriorSample,
        };
        let mut seen = HashMap::with_capacity(self.cpu_samples.len());

        for pid in pids {
            let name = match self.probe.name(pid) {
                Ok(name) => name,
                // Not known to be a target; nothing to count as skipped.
                Err(_) => continue,
            };
            if !self.matcher.matches(&name) {
                continue;
            }
            match self.sample_process(pid, now) {
                Ok((memory, method, cpu, sample)) => {
                    snapshot.aggregate_memory_bytes += memory;
                    snapshot.aggregate_cpu_percent += cpu;
                    snapshot.process_count += 1;
                    match method {
                        MemoryMethod::Uss => snapshot.uss_processes += 1,
                        MemoryMethod::Rss => snapshot.rss_processes += 1,
                    }
                    seen.insert(pid, sample);
                }
                Err(e) => {
                    log::debug!("Skipping {name} ({pid}): {e}");
                    snapshot.skipped_processes += 1;
                }
            }
        }
        // Drop CPU history of processes that are gone or no longer match.
        self.cpu_samples = seen;

        let system = self.probe.system();
        snapshot.system_memory_used_bytes = system.memory_used_bytes;
        snapshot.system_cpu_percent = system
            .cpu
            .map_or(0.0, |cpu| cpu_percent(self.last_system_cpu, cpu));
        self.last_system_cpu = system.cpu;

        let (sent, recv, status) = match system.net {
            Some(net) => net_delta(self.last_net, net),
            None => (None, None, NetDeltaStatus::Unavailable),
        };
        snapshot.net_sent_delta_bytes = sent;
        snapshot.net_recv_delta_bytes = recv;
        snapshot.net_status = status;
        self.last_net = system.net;

        Ok(snapshot)
    }

    fn sample_process(
        &self,
        pid: u32,
        now: Instant,
    ) -> Result<(u64, MemoryMethod, f64, CpuSample), ProcessAccessError> {
        let memory = measure_memory(&self.probe, pid)?;
        if memory.method == MemoryMethod::Rss {
            log::debug!("Unique memory denied for {pid}, using resident set size");
        }
        let ticks = self.probe.cpu_ticks(pid)?;
        let cpu = match self.cpu_samples.get(&pid) {
            Some(prev) => {
                let wall = now.saturating_duration_since(prev.at).as_secs_f64();
                if wall > 0.0 {
                    let cpu_secs = ticks.saturating_sub(prev.ticks) as f64
                        / self.probe.ticks_per_second();
                    cpu_secs / wall * 100.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        Ok((memory.bytes, memory.method, cpu, CpuSample { ticks, at: now }))
    }

    /// Take a snapshot on the calling thread and append it to `sink`.
    pub async fn emit(&mut self, sink: &TelemetrySink) -> Result<ResourceSnapshot, AggregateError> {
        let snapshot = self.tick()?;
        sink.append(RecordKind::ResourceUsage, snapshot.to_payload())
            .await?;
        Ok(snapshot)
    }
}

/// Emit a snapshot every `period` until `shutdown` turns true or its
/// sender is dropped. The signal is checked between ticks only, so an
/// in-flight append always completes. Probe reads run on the blocking
/// pool. Returns the number of snapshots written; a zero `period` is
/// refused and nothing is written.
pub async fn run_periodic<P: ProcessProbe + 'static>(
    mut aggregator: ResourceAggregator<P>,
    sink: Arc<TelemetrySink>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    if period.is_zero() {
        log::error!("Resource sampling period must be greater than zero; sampler not started");
        return 0;
    }
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut written = 0u64;

    loop {
        let ticked = tokio::select! {
            _ = interval.tick() => true,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                false
            }
        };
        let stop = *shutdown.borrow();
        if stop {
            break;
        }
        if !ticked {
            continue;
        }

        let joined = tokio::task::spawn_blocking(move || {
            let tick = aggregator.tick();
            (aggregator, tick)
        })
        .await;
        let (returned, tick) = match joined {
            Ok(done) => done,
            Err(e) => {
                log::error!("Resource sampler tick aborted: {e}");
                break;
            }
        };
        aggregator = returned;

        let emitted = match tick {
            Ok(s) => sink
                .append(RecordKind::ResourceUsage, s.to_payload())
                .await
                .map(|_| s)
                .map_err(AggregateError::from),
            Err(e) => Err(AggregateError::from(e)),
        };
        match emitted {
            Ok(s) => {
                written += 1;
                log::info!(
                    "{} memory: {:.2} MiB, processes: {}, CPU: {:.1}%, uss/rss: {}/{}",
                    s.target,
                    s.aggregate_memory_bytes as f64 / (1024.0 * 1024.0),
                    s.process_count,
                    s.aggregate_cpu_percent,
                    s.uss_processes,
                    s.rss_processes
                );
                match s.net_status {
                    NetDeltaStatus::CounterReset => {
                        log::warn!("Network counters went backwards; deltas clamped to zero")
                    }
                    NetDeltaStatus::Unavailable => {
                        log::warn!("Network counters unreadable; deltas omitted")
                    }
                    _ => {}
                }
            }
            Err(e) => log::error!("Resource snapshot failed: {e}"),
        }
    }

    log::info!("Resource sampler stopped after {written} snapshots");
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::SystemCounters;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct FakeProc {
        name: String,
        uss: Result<u64, ()>,
        rss: u64,
        ticks: u64,
        gone: bool,
    }

    #[derive(Default)]
    struct FakeState {
        procs: HashMap<u32, FakeProc>,
        system: SystemCounters,
        enumeration_fails: bool,
        enumeration_delay: Duration,
    }

    #[derive(Clone, Default)]
    struct FakeProbe(Arc<Mutex<FakeState>>);

    impl FakeProbe {
        fn add(&self, pid: u32, name: &str, uss: Result<u64, ()>, rss: u64) {
            self.0.lock().unwrap().procs.insert(
                pid,
                FakeProc {
                    name: name.to_string(),
                    uss,
                    rss,
                    ticks: 0,
                    gone: false,
                },
            );
        }

        fn with<F: FnOnce(&mut FakeState)>(&self, f: F) {
            f(&mut self.0.lock().unwrap());
        }

        fn get(&self, pid: u32) -> Result<FakeProc, ProcessAccessError> {
            match self.0.lock().unwrap().procs.get(&pid) {
                Some(p) if !p.gone => Ok(p.clone()),
                _ => Err(ProcessAccessError::Gone { pid }),
            }
        }
    }

    impl ProcessProbe for FakeProbe {
        fn pids(&self) -> Result<Vec<u32>, EnumerationError> {
            let delay = self.0.lock().unwrap().enumeration_delay;
            std::thread::sleep(delay);
            let state = self.0.lock().unwrap();
            if state.enumeration_fails {
                return Err(EnumerationError(std::io::ErrorKind::PermissionDenied.into()));
            }
            let mut pids: Vec<u32> = state.procs.keys().copied().collect();
            pids.sort_unstable();
            Ok(pids)
        }
        fn name(&self, pid: u32) -> Result<String, ProcessAccessError> {
            // Names stay readable after exit so the race lands in later reads.
            self.0
                .lock()
                .unwrap()
                .procs
                .get(&pid)
                .map(|p| p.name.clone())
                .ok_or(ProcessAccessError::Gone { pid })
        }
        fn unique_memory(&self, pid: u32) -> Result<u64, ProcessAccessError> {
            self.get(pid)?
                .uss
                .map_err(|()| ProcessAccessError::Denied { pid })
        }
        fn resident_memory(&self, pid: u32) -> Result<u64, ProcessAccessError> {
            Ok(self.get(pid)?.rss)
        }
        fn cpu_ticks(&self, pid: u32) -> Result<u64, ProcessAccessError> {
            Ok(self.get(pid)?.ticks)
        }
        fn ticks_per_second(&self) -> f64 {
            100.0
        }
        fn system(&self) -> SystemCounters {
            self.0.lock().unwrap().system
        }
    }

    #[test]
    fn no_matches_still_produces_zeroed_snapshot() {
        let probe = FakeProbe::default();
        probe.add(1, "systemd", Ok(10), 10);
        let mut agg = ResourceAggregator::new(probe, "chrome");
        let s = agg.tick().unwrap();
        assert_eq!(s.process_count, 0);
        assert_eq!(s.aggregate_memory_bytes, 0);
        assert_eq!(s.aggregate_cpu_percent, 0.0);
    }

    #[test]
    fn sums_matching_processes_case_insensitively() {
        let probe = FakeProbe::default();
        probe.add(10, "chrome", Ok(100), 500);
        probe.add(11, "Google Chrome Helper", Ok(200), 500);
        probe.add(12, "firefox", Ok(999), 999);
        let mut agg = ResourceAggregator::new(probe, "Chrome");
        let s = agg.tick().unwrap();
        assert_eq!(s.process_count, 2);
        assert_eq!(s.aggregate_memory_bytes, 300);
        assert_eq!(s.uss_processes, 2);
        assert_eq!(s.target, "chrome");
    }

    #[test]
    fn denied_uss_falls_back_to_rss_and_is_counted() {
        let probe = FakeProbe::default();
        probe.add(10, "chrome", Ok(100), 500);
        probe.add(11, "chrome", Err(()), 700);
        let mut agg = ResourceAggregator::new(probe, "chrome");
        let s = agg.tick().unwrap();
        assert_eq!(s.process_count, 2);
        assert_eq!(s.aggregate_memory_bytes, 800);
        assert_eq!((s.uss_processes, s.rss_processes), (1, 1));
    }

    #[test]
    fn vanished_process_is_skipped_not_fatal() {
        let probe = FakeProbe::default();
        probe.add(10, "chrome", Ok(100), 500);
        probe.add(11, "chrome", Ok(100), 500);
        probe.with(|s| s.procs.get_mut(&11).unwrap().gone = true);
        let mut agg = ResourceAggregator::new(probe, "chrome");
        let s = agg.tick().unwrap();
        assert_eq!(s.process_count, 1);
        assert_eq!(s.skipped_processes, 1);
    }

    #[test]
    fn total_enumeration_failure_escalates() {
        let probe = FakeProbe::default();
        probe.with(|s| s.enumeration_fails = true);
        let mut agg = ResourceAggregator::new(probe, "chrome");
        assert!(agg.tick().is_err());
    }

    #[test]
    fn cpu_percent_is_relative_to_previous_sample() {
        let probe = FakeProbe::default();
        probe.add(10, "chrome", Ok(1), 1);
        let mut agg = ResourceAggregator::new(probe.clone(), "chrome");
        let t0 = Instant::now();
        assert_eq!(agg.tick_at(t0).unwrap().aggregate_cpu_percent, 0.0);

        // 100 ticks at 100 Hz over 2 s of wall time.
        probe.with(|s| s.procs.get_mut(&10).unwrap().ticks = 100);
        let s = agg.tick_at(t0 + Duration::from_secs(2)).unwrap();
        assert!((s.aggregate_cpu_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn network_deltas_mark_first_sample_and_resets() {
        let probe = FakeProbe::default();
        let set_net = |sent, recv| {
            probe.with(|s| {
                s.system.net = Some(NetCounters {
                    bytes_sent: sent,
                    bytes_recv: recv,
                })
            })
        };
        let mut agg = ResourceAggregator::new(probe.clone(), "chrome");

        set_net(1000, 5000);
        let first = agg.tick().unwrap();
        assert_eq!(first.net_status, NetDeltaStatus::NoPriorSample);
        assert_eq!(first.net_sent_delta_bytes, None);

        set_net(1500, 5100);
        let second = agg.tick().unwrap();
        assert_eq!(second.net_status, NetDeltaStatus::Ok);
        assert_eq!(second.net_sent_delta_bytes, Some(500));
        assert_eq!(second.net_recv_delta_bytes, Some(100));

        set_net(10, 5200);
        let third = agg.tick().unwrap();
        assert_eq!(third.net_status, NetDeltaStatus::CounterReset);
        assert_eq!(third.net_sent_delta_bytes, Some(0));
        assert_eq!(third.net_recv_delta_bytes, Some(100));
    }

    #[test]
    fn system_cpu_from_counter_deltas() {
        let probe = FakeProbe::default();
        let mut agg = ResourceAggregator::new(probe.clone(), "chrome");
        probe.with(|s| s.system.cpu = Some(CpuTimes { busy: 100, total: 1000 }));
        assert_eq!(agg.tick().unwrap().system_cpu_percent, 0.0);
        probe.with(|s| s.system.cpu = Some(CpuTimes { busy: 150, total: 1200 }));
        assert!((agg.tick().unwrap().system_cpu_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn unreadable_system_cpu_does_not_become_a_baseline() {
        let probe = FakeProbe::default();
        let mut agg = ResourceAggregator::new(probe.clone(), "chrome");
        assert_eq!(agg.tick().unwrap().system_cpu_percent, 0.0);
        // Cumulative since boot; diffing against a zero baseline would
        // report the boot average.
        probe.with(|s| s.system.cpu = Some(CpuTimes { busy: 900, total: 1000 }));
        assert_eq!(agg.tick().unwrap().system_cpu_percent, 0.0);
        probe.with(|s| s.system.cpu = Some(CpuTimes { busy: 910, total: 1100 }));
        assert!((agg.tick().unwrap().system_cpu_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn net_dev_appearing_late_starts_from_no_prior_sample() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("meminfo"), "MemTotal: 1000 kB\nMemAvailable: 400 kB\n")
            .unwrap();
        let probe = crate::probe::ProcfsProbe::with_root(root);
        let mut agg = ResourceAggregator::new(probe, "chrome");

        let first = agg.tick().unwrap();
        assert_eq!(first.net_status, NetDeltaStatus::Unavailable);
        assert_eq!(first.net_sent_delta_bytes, None);
        assert_eq!(first.net_recv_delta_bytes, None);

        let net_dev = |recv: u64, sent: u64| {
            format!(
                "Inter-|   Receive                                                |  Transmit\n \
                 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n  \
                 eth0: {recv} 10 0 0 0 0 0 0 {sent} 10 0 0 0 0 0 0\n"
            )
        };
        std::fs::create_dir_all(root.join("net")).unwrap();
        std::fs::write(root.join("net/dev"), net_dev(5_000_000, 3_000_000)).unwrap();
        let second = agg.tick().unwrap();
        assert_eq!(second.net_status, NetDeltaStatus::NoPriorSample);
        assert_eq!(second.net_sent_delta_bytes, None);
        assert_eq!(second.net_recv_delta_bytes, None);

        std::fs::write(root.join("net/dev"), net_dev(5_000_200, 3_000_050)).unwrap();
        let third = agg.tick().unwrap();
        assert_eq!(third.net_status, NetDeltaStatus::Ok);
        assert_eq!(third.net_recv_delta_bytes, Some(200));
        assert_eq!(third.net_sent_delta_bytes, Some(50));

        // Unreadable again: the next readable tick must not diff against
        // the stale reading from before the gap.
        std::fs::remove_file(root.join("net/dev")).unwrap();
        assert_eq!(agg.tick().unwrap().net_status, NetDeltaStatus::Unavailable);
        std::fs::write(root.join("net/dev"), net_dev(9_000_000, 9_000_000)).unwrap();
        assert_eq!(agg.tick().unwrap().net_status, NetDeltaStatus::NoPriorSample);
    }

    #[test]
    fn payload_carries_type_and_null_deltas() {
        let probe = FakeProbe::default();
        probe.with(|s| s.system.net = Some(NetCounters::default()));
        let mut agg = ResourceAggregator::new(probe, "chrome");
        let payload = agg.tick().unwrap().to_payload();
        assert_eq!(payload["type"], RESOURCE_USAGE_TYPE);
        assert!(payload["net_sent_delta_bytes"].is_null());
        assert_eq!(payload["net_status"], "no_prior_sample");
    }

    #[tokio::test]
    async fn emit_appends_exactly_one_record_per_tick() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.ndjson");
        let sink = TelemetrySink::open(&path, Duration::from_secs(1)).unwrap();
        let mut agg = ResourceAggregator::new(FakeProbe::default(), "chrome");
        agg.emit(&sink).await.unwrap();
        agg.emit(&sink).await.unwrap();

        let records = crate::sink::read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == RecordKind::ResourceUsage));
        assert_eq!(records[0].event_type, RESOURCE_USAGE_TYPE);
        assert_eq!(records[0].payload["process_count"], 0);
    }

    #[tokio::test]
    async fn periodic_task_stops_on_signal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.ndjson");
        let sink = Arc::new(TelemetrySink::open(&path, Duration::from_secs(1)).unwrap());
        let agg = ResourceAggregator::new(FakeProbe::default(), "chrome");
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(run_periodic(
            agg,
            Arc::clone(&sink),
            Duration::from_millis(20),
            rx,
        ));
        tokio::time::sleep(Duration::from_millis(110)).await;
        tx.send(true).unwrap();
        let written = task.await.unwrap();

        assert!(written >= 2, "only {written} snapshots");
        let records = crate::sink::read_records(&path).unwrap();
        assert_eq!(records.len() as u64, written);
    }

    #[tokio::test]
    async fn zero_period_is_refused_without_panicking() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.ndjson");
        let sink = Arc::new(TelemetrySink::open(&path, Duration::from_secs(1)).unwrap());
        let agg = ResourceAggregator::new(FakeProbe::default(), "chrome");
        let (_tx, rx) = watch::channel(false);

        let written = run_periodic(agg, Arc::clone(&sink), Duration::ZERO, rx).await;
        assert_eq!(written, 0);
        assert!(crate::sink::read_records(&path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn slow_enumeration_does_not_stall_the_runtime() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("log.ndjson");
        let sink = Arc::new(TelemetrySink::open(&path, Duration::from_secs(1)).unwrap());
        let probe = FakeProbe::default();
        probe.with(|s| s.enumeration_delay = Duration::from_millis(300));
        let agg = ResourceAggregator::new(probe, "chrome");
        let (tx, rx) = watch::channel(false);

        // Single-threaded runtime: a tick run inline would freeze this loop.
        let task = tokio::spawn(run_periodic(
            agg,
            Arc::clone(&sink),
            Duration::from_millis(10),
            rx,
        ));
        let mut last = Instant::now();
        let mut longest = Duration::ZERO;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let now = Instant::now();
            longest = longest.max(now - last);
            last = now;
        }
        tx.send(true).unwrap();
        let written = task.await.unwrap();

        assert!(longest < Duration::from_millis(150), "stalled for {longest:?}");
        assert!(written >= 1);
    }
}
