use thiserror::Error;

/// Hostname could not be turned into an address. Terminal: no ports are probed.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("target must not be empty")]
    Empty,
    #[error("could not resolve hostname {host}: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not resolve hostname {0}: no addresses returned")]
    NoAddresses(String),
}

/// Malformed `--ports` argument.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortSpecError {
    #[error("invalid port value: {0:?}")]
    Invalid(String),
    #[error("port out of range (1-65535): {0}")]
    OutOfRange(u32),
    #[error("invalid range {start}-{end} (start > end)")]
    ReversedRange { start: u16, end: u16 },
    #[error("no ports given")]
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,
    #[error("banner timeout must be greater than zero")]
    ZeroBannerTimeout,
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Faults that cross the scheduler boundary. Per-port network failures never show up here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Ports(#[from] PortSpecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("scan interrupted")]
    Interrupted,
}
