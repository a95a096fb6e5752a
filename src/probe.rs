use std::io;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::banner;
use crate::types::{PortResult, PortState, ScanConfig};

/// Probe one TCP port on `ip`.
///
/// Never fails: refusals, timeouts and unreachable errors are folded into the
/// returned [`PortResult`]. On a successful connect the banner for the port is
/// captured before the connection is dropped.
pub async fn probe(ip: IpAddr, port: u16, host: &str, config: &ScanConfig) -> PortResult {
    let addr = SocketAddr::new(ip, port);
    let start = Instant::now();
    let connect_res = time::timeout(config.connect_timeout(), TcpStream::connect(addr)).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match connect_res {
        Ok(Ok(mut stream)) => {
            let banner =
                banner::capture_banner(&mut stream, port, host, config.banner_timeout()).await;
            drop(stream);
            info!(port, %banner, "open");
            PortResult::open(port, banner, latency_ms)
        }
        Ok(Err(err)) => match classify_connect_error(&err) {
            PortState::Closed => {
                debug!(port, "closed");
                PortResult::closed(port, latency_ms)
            }
            _ => {
                if is_unreachable(&err) {
                    debug!(port, error = %err, "filtered");
                } else {
                    warn!(port, error = %err, "unexpected connect error, reporting filtered");
                }
                PortResult::filtered(port, latency_ms)
            }
        },
        Err(_) => {
            debug!(port, "connect timed out");
            PortResult::filtered(port, latency_ms)
        }
    }
}

/// Map a failed `connect()` to a port state.
///
/// An active refusal or reset means something answered for the port: closed.
/// Everything else (unreachable networks, hosts, timeouts) counts as filtered.
pub fn classify_connect_error(err: &io::Error) -> PortState {
    match err.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset => PortState::Closed,
        _ => PortState::Filtered,
    }
}

/// Errors that are the normal signature of a dropped or unroutable SYN.
fn is_unreachable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::AddrNotAvailable
    )
}
