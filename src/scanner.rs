use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use ::time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::ResultAggregator;
use crate::error::ScanError;
use crate::probe::probe;
use crate::types::{PortState, ScanConfig, ScanReport, ScanTarget};

/// Scan `ports` on an already resolved target and return one result per port.
///
/// - Runs a fixed pool of `min(config.workers(), ports.len())` tasks.
/// - Workers pull ports from a shared queue until it is drained.
/// - Blocks until every port has a result; the report is sorted by port.
pub async fn run_scan(
    target: &ScanTarget,
    ports: &[u16],
    config: &ScanConfig,
) -> Result<ScanReport, ScanError> {
    run_scan_internal(target, ports, config, None, None).await
}

/// Like [`run_scan`], but stops as soon as `cancel` fires.
///
/// Probes still in flight are dropped, which closes their sockets. Any port
/// left without a result turns the whole call into `ScanError::Interrupted`.
pub async fn run_scan_with_cancel(
    target: &ScanTarget,
    ports: &[u16],
    config: &ScanConfig,
    cancel: CancellationToken,
) -> Result<ScanReport, ScanError> {
    run_scan_internal(target, ports, config, Some(cancel), None).await
}

/// Variant that submits into a caller-provided aggregator so progress can be
/// observed while the scan runs.
///
/// The aggregator may already hold results from earlier scans; only what this
/// call submits for `ports` ends up in the returned report.
pub async fn run_scan_with_shared(
    target: &ScanTarget,
    ports: &[u16],
    config: &ScanConfig,
    cancel: CancellationToken,
    shared: ResultAggregator,
) -> Result<ScanReport, ScanError> {
    run_scan_internal(target, ports, config, Some(cancel), Some(shared)).await
}

async fn run_scan_internal(
    target: &ScanTarget,
    ports: &[u16],
    config: &ScanConfig,
    cancel_opt: Option<CancellationToken>,
    shared_opt: Option<ResultAggregator>,
) -> Result<ScanReport, ScanError> {
    let started_at = now_rfc3339();
    let start = Instant::now();

    let work = unique_ports(ports);
    let requested: HashSet<u16> = work.iter().copied().collect();
    let total = work.len();
    let workers = config.workers().min(total);
    let results = shared_opt.unwrap_or_default();
    let mark = results.mark().await;
    let cancel = cancel_opt.unwrap_or_default();

    info!(host = %target.input, ip = %target.ip, ports = total, workers, "starting scan");

    let queue = Arc::new(Mutex::new(work));
    let host: Arc<str> = Arc::from(target.input.as_str());
    let ip = target.ip;
    let config = *config;

    let mut set = JoinSet::new();
    for worker_id in 0..workers {
        let queue = queue.clone();
        let results = results.clone();
        let cancel = cancel.clone();
        let host = host.clone();

        set.spawn(async move {
            let mut probed = 0usize;
            loop {
                let Some(port) = queue.lock().await.pop_front() else {
                    break;
                };
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    result = probe(ip, port, &host, &config) => results.submit(result).await,
                }
                probed += 1;
            }
            debug!(worker_id, probed, "worker finished");
            probed
        });
    }

    let mut done = 0usize;
    while let Some(res) = set.join_next().await {
        match res {
            Ok(probed) => done += probed,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {}
        }
    }

    if done < total {
        info!(done, total, "scan interrupted");
        return Err(ScanError::Interrupted);
    }

    let mut port_results = results.snapshot_since(mark).await;
    port_results.retain(|r| requested.contains(&r.port));

    let report = ScanReport {
        target: target.clone(),
        started_at,
        elapsed_ms: start.elapsed().as_millis() as u64,
        results: port_results,
    };
    info!(
        open = report.count(PortState::Open),
        elapsed_ms = report.elapsed_ms,
        "scan complete"
    );
    Ok(report)
}

/// Deduplicate while keeping first-appearance order.
fn unique_ports(ports: &[u16]) -> VecDeque<u16> {
    let mut seen = HashSet::with_capacity(ports.len());
    ports.iter().copied().filter(|p| seen.insert(*p)).collect()
}

/// Scan start time in UTC. Formatting only fails for years outside 0..=9999.
fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
