use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// Reachability of a single TCP port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PortState {
    /// The three-way handshake completed.
    Open,
    /// The target actively refused the connection.
    Closed,
    /// No answer within the connect timeout, or the network reported the host unreachable.
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
            PortState::Filtered => write!(f, "filtered"),
        }
    }
}

/// Outcome of probing one port. Produced exactly once per scanned port.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub state: PortState,
    /// Captured service banner; empty when nothing was captured.
    pub banner: String,
    pub latency_ms: u64,
}

impl PortResult {
    pub fn open(port: u16, banner: String, latency_ms: u64) -> Self {
        Self {
            port,
            state: PortState::Open,
            banner,
            latency_ms,
        }
    }

    pub fn closed(port: u16, latency_ms: u64) -> Self {
        Self {
            port,
            state: PortState::Closed,
            banner: String::new(),
            latency_ms,
        }
    }

    pub fn filtered(port: u16, latency_ms: u64) -> Self {
        Self {
            port,
            state: PortState::Filtered,
            banner: String::new(),
            latency_ms,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Timeouts and pool size for one scan. Immutable once the scan starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    connect_timeout: Duration,
    banner_timeout: Duration,
    workers: usize,
}

impl ScanConfig {
    /// Build a validated config. Both timeouts must be non-zero and at least one worker is required.
    pub fn new(
        connect_timeout: Duration,
        banner_timeout: Duration,
        workers: usize,
    ) -> Result<Self, ConfigError> {
        if connect_timeout.is_zero() {
            return Err(ConfigError::ZeroConnectTimeout);
        }
        if banner_timeout.is_zero() {
            return Err(ConfigError::ZeroBannerTimeout);
        }
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(Self {
            connect_timeout,
            banner_timeout,
            workers,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn banner_timeout(&self) -> Duration {
        self.banner_timeout
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            banner_timeout: Duration::from_secs(2),
            workers: 100,
        }
    }
}

/// The host being scanned: the user's input and the address it resolved to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub input: String,
    pub ip: IpAddr,
}

/// All results for one scan, sorted by ascending port.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanReport {
    pub target: ScanTarget,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub results: Vec<PortResult>,
}

impl ScanReport {
    pub fn open(&self) -> impl Iterator<Item = &PortResult> {
        self.results.iter().filter(|r| r.is_open())
    }

    pub fn count(&self, state: PortState) -> usize {
        self.results.iter().filter(|r| r.state == state).count()
    }
}
