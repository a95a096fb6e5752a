use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use port_banner_scan::aggregator::ResultAggregator;
use port_banner_scan::error::ScanError;
use port_banner_scan::types::{PortResult, ScanConfig, ScanReport};
use port_banner_scan::{ports, report, resolver, scanner};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Exit status used when the user aborts a running scan.
const EXIT_INTERRUPTED: u8 = 130;

/// port-banner-scan: concurrent TCP connect scanner with banner capture.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-banner-scan",
    version,
    about = "Concurrent TCP connect scanner for a single host with protocol-aware banner capture.",
    long_about = None
)]
struct Cli {
    /// Target hostname or IP address.
    target: String,

    /// Comma-separated ports or ranges (e.g. 22,80,8000-8010). Defaults to 18 common ports.
    #[arg(short = 'p', long)]
    ports: Option<String>,

    /// Socket connect timeout in seconds.
    #[arg(short = 't', long, default_value_t = 1.0)]
    timeout: f64,

    /// Time allowed for reading a service banner, in seconds.
    #[arg(long = "banner-timeout", default_value_t = 2.0)]
    banner_timeout: f64,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = 100)]
    threads: usize,

    /// Write the full report as pretty JSON to this path (optional).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if matches!(e.downcast_ref::<ScanError>(), Some(ScanError::Interrupted)) => {
            println!("\n[!] Scan interrupted by user");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let port_list = match cli.ports.as_deref() {
        Some(spec) => ports::parse_port_list(spec).map_err(ScanError::from)?,
        None => ports::default_ports(),
    };
    let config = ScanConfig::new(
        secs_to_duration(cli.timeout),
        secs_to_duration(cli.banner_timeout),
        cli.threads,
    )
    .map_err(ScanError::from)?;

    println!("{}", "=".repeat(60));
    println!("port-banner-scan v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "=".repeat(60));
    println!("Starting scan at {}", now_utc_label());

    let target = resolver::resolve_target(&cli.target)
        .await
        .map_err(ScanError::from)?;
    println!("Scanning target: {} ({})", target.input, target.ip);
    println!("Scanning {} ports...", port_list.len());
    println!("{}", "-".repeat(40));

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<PortResult>();
    let printer = tokio::spawn(async move {
        while let Some(hit) = rx.recv().await {
            println!("{}", report::format_hit_line(&hit));
        }
    });

    let res = scanner::run_scan_with_shared(
        &target,
        &port_list,
        &config,
        cancel,
        ResultAggregator::with_open_notifier(tx),
    )
    .await;
    let _ = printer.await;
    let results = res?;

    print!("{}", report::render_summary(&results));

    if let Some(path) = cli.output.as_deref() {
        write_results_json(path, &results)?;
        println!("\nWrote JSON results to {}", path.display());
    }

    Ok(())
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }
}

/// Negative, NaN and overflowing inputs map to zero, which `ScanConfig::new` rejects.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn now_utc_label() -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    time::OffsetDateTime::now_utc()
        .format(fmt)
        .unwrap_or_default()
}

fn write_results_json(path: &Path, results: &ScanReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    serde_json::to_writer_pretty(file, results)
        .with_context(|| format!("failed to write JSON to {}", path.display()))?;
    Ok(())
}
