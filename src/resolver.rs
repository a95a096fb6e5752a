use std::net::IpAddr;

use tokio::net::lookup_host;
use tracing::debug;

use crate::error::ResolutionError;
use crate::types::ScanTarget;

/// Resolve a hostname or IP literal to a single address.
///
/// IP literals are returned as-is without touching DNS. For names, the first
/// address returned by the system resolver is used.
pub async fn resolve(host: &str) -> Result<IpAddr, ResolutionError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ResolutionError::Empty);
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let mut addrs = lookup_host((host, 0))
        .await
        .map_err(|source| ResolutionError::Lookup {
            host: host.to_string(),
            source,
        })?;

    let ip = addrs
        .next()
        .map(|sock| sock.ip())
        .ok_or_else(|| ResolutionError::NoAddresses(host.to_string()))?;
    debug!(%host, %ip, "resolved target");
    Ok(ip)
}

pub async fn resolve_target(input: &str) -> Result<ScanTarget, ResolutionError> {
    let ip = resolve(input).await?;
    Ok(ScanTarget {
        input: input.trim().to_string(),
        ip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn ip_literal_short_circuits() {
        let ip = resolve("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        let ip6 = resolve("::1").await.unwrap();
        assert!(ip6.is_loopback());
    }

    #[tokio::test]
    async fn empty_input_rejected() {
        assert!(matches!(resolve("   ").await, Err(ResolutionError::Empty)));
    }

    #[tokio::test]
    async fn invalid_host_fails() {
        let res = resolve("this.is.not.a.valid.host.invalid").await;
        assert!(res.is_err());
    }
}
