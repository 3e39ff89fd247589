use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use ::time::OffsetDateTime;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::ScanConfig;
use crate::prober::probe_port;
use crate::target::Target;
use crate::types::{PortState, ProbeResult, ScanReport};

/// Counters shared with every probe task, readable while a scan runs.
#[derive(Clone, Debug, Default)]
pub struct SharedProgress {
    pub scanned_done: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
    /// Probes currently holding a capacity permit.
    pub in_flight: Arc<AtomicUsize>,
    /// Highest value `in_flight` reached.
    pub peak_in_flight: Arc<AtomicUsize>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Marks one probe as in flight for as long as it lives.
struct InFlight {
    counter: Arc<AtomicUsize>,
}

impl InFlight {
    fn enter(progress: &SharedProgress) -> Self {
        let now = progress.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        progress.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        Self {
            counter: progress.in_flight.clone(),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scan `ports` on `target` and package the results as a report.
pub async fn scan_target<F>(
    target: &Target,
    ports: &[u16],
    cfg: &ScanConfig,
    on_result: F,
) -> ScanReport
where
    F: FnMut(&ProbeResult, usize, usize),
{
    let started_at = OffsetDateTime::now_utc();
    let results =
        scan_ports_with_shared(target.addr, ports, cfg, SharedProgress::new(), on_result).await;
    ScanReport {
        target: target.input.clone(),
        started_at,
        results,
    }
}

/// Probe every port once and return one result per distinct port, ascending.
pub async fn scan_ports(addr: IpAddr, ports: &[u16], cfg: &ScanConfig) -> Vec<ProbeResult> {
    scan_ports_with_shared(addr, ports, cfg, SharedProgress::new(), |_, _, _| {}).await
}

/// Core scheduler.
///
/// - One task per port, all spawned up front.
/// - Task `i` first sleeps `i * start_delay_step`, then waits for a permit from
///   a semaphore sized to `cfg.concurrency`. The permit is held from just before
///   connect until the banner phase has closed the socket.
/// - `on_result(result, done, total)` is called in completion order.
/// - A task that dies without reporting is recorded as `Filtered`.
pub async fn scan_ports_with_shared<F>(
    addr: IpAddr,
    ports: &[u16],
    cfg: &ScanConfig,
    shared: SharedProgress,
    mut on_result: F,
) -> Vec<ProbeResult>
where
    F: FnMut(&ProbeResult, usize, usize),
{
    let mut pending: BTreeSet<u16> = ports.iter().copied().collect();
    let total = pending.len();
    let cfg = Arc::new(cfg.clone());
    let sem = Arc::new(Semaphore::new(cfg.concurrency.max(1)));
    let mut set = JoinSet::new();

    tracing::info!(
        %addr,
        ports = total,
        concurrency = cfg.concurrency,
        timeout_ms = cfg.timeout.as_millis() as u64,
        "scan starting"
    );

    for (index, &port) in pending.iter().enumerate() {
        let sem = sem.clone();
        let cfg = cfg.clone();
        let shared = shared.clone();

        set.spawn(async move {
            let delay = cfg.start_delay(index);
            if !delay.is_zero() {
                time::sleep(delay).await;
            }

            let state = match sem.acquire_owned().await {
                Ok(_permit) => {
                    let _slot = InFlight::enter(&shared);
                    probe_port(SocketAddr::new(addr, port), &cfg).await
                }
                // The semaphore is never closed while tasks run.
                Err(_) => PortState::Filtered,
            };

            if state.is_open() {
                shared.open_count.fetch_add(1, Ordering::Relaxed);
            }
            shared.scanned_done.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(port, state = %state.label(), "probe finished");
            ProbeResult::new(port, state)
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => {
                if pending.remove(&result.port) {
                    on_result(&result, results.len() + 1, total);
                    results.push(result);
                }
            }
            Err(e) => tracing::warn!("probe task failed: {e}"),
        }
    }

    for port in pending {
        tracing::warn!(port, "no result recorded; marking filtered");
        let result = ProbeResult::new(port, PortState::Filtered);
        on_result(&result, results.len() + 1, total);
        results.push(result);
    }

    results.sort_by_key(|r| r.port);
    tracing::info!(
        %addr,
        open = shared.open_count.load(Ordering::Relaxed),
        done = results.len(),
        "scan finished"
    );
    results
}
