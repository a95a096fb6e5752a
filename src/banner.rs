//! Protocol-aware banner capture on an already-open connection.
//!
//! Capture is best effort: every I/O error, timeout or undecodable payload
//! yields an empty string, because the port has already been confirmed open.
use std::net::Ipv6Addr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant};
use tracing::trace;

/// Services that announce themselves as soon as the connection is accepted
/// (FTP, SSH, Telnet, SMTP, POP3, IMAP).
pub const GREETING_PORTS: [u16; 6] = [21, 22, 23, 25, 110, 143];

pub const HTTP_PORT: u16 = 80;

/// Greeting banners longer than this many characters are cut and marked with `...`.
pub const MAX_GREETING_CHARS: usize = 50;

const GREETING_READ_BYTES: usize = 1024;
const HTTP_MAX_HEADER_BYTES: usize = 4096;

/// How to extract a banner from a freshly opened connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerPolicy {
    /// Wait for the server to speak first and keep its first line of output.
    Greeting,
    /// Send a minimal HTTP request and keep the `Server` response header.
    HttpServerHeader,
    /// Do not attempt capture.
    Skip,
}

impl BannerPolicy {
    pub fn for_port(port: u16) -> Self {
        if GREETING_PORTS.contains(&port) {
            BannerPolicy::Greeting
        } else if port == HTTP_PORT {
            BannerPolicy::HttpServerHeader
        } else {
            BannerPolicy::Skip
        }
    }
}

/// Capture a banner using the policy registered for `port`.
///
/// `host` is the name the user asked for, sent as the HTTP `Host` header.
pub async fn capture_banner<S>(stream: &mut S, port: u16, host: &str, timeout: Duration) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    capture_with_policy(stream, BannerPolicy::for_port(port), host, timeout).await
}

pub async fn capture_with_policy<S>(
    stream: &mut S,
    policy: BannerPolicy,
    host: &str,
    timeout: Duration,
) -> String
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let captured = match policy {
        BannerPolicy::Greeting => read_greeting(stream, timeout).await,
        BannerPolicy::HttpServerHeader => read_http_server(stream, host, timeout).await,
        BannerPolicy::Skip => None,
    };
    captured.unwrap_or_default()
}

async fn read_greeting<S>(stream: &mut S, timeout: Duration) -> Option<String>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; GREETING_READ_BYTES];
    match time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            let text = String::from_utf8(buf).ok()?;
            let banner = format_greeting(&text);
            (!banner.is_empty()).then_some(banner)
        }
        Ok(Err(e)) => {
            trace!(error = %e, "greeting read failed");
            None
        }
        _ => None,
    }
}

/// Trim a raw greeting and render it for display: `- <text>`, cut to
/// [`MAX_GREETING_CHARS`] characters with a trailing `...` when longer.
/// Whitespace-only input renders as an empty string.
pub fn format_greeting(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.chars().count() > MAX_GREETING_CHARS {
        let head: String = trimmed.chars().take(MAX_GREETING_CHARS).collect();
        format!("- {head}...")
    } else {
        format!("- {trimmed}")
    }
}

async fn read_http_server<S>(stream: &mut S, host: &str, timeout: Duration) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let deadline = Instant::now() + timeout;
    let request = format!(
        "GET / HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        host_header(host)
    );
    let sent = time::timeout_at(deadline, async {
        stream.write_all(request.as_bytes()).await?;
        stream.flush().await
    })
    .await;
    if !matches!(sent, Ok(Ok(()))) {
        trace!("http request could not be sent");
        return None;
    }

    // Whatever arrived before the deadline is still parsed.
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while header_end(&buf).is_none() && buf.len() < HTTP_MAX_HEADER_BYTES {
        match time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => {
                trace!(error = %e, "http read failed");
                break;
            }
        }
    }

    let head = &buf[..header_end(&buf).unwrap_or(buf.len())];
    let text = decode_head(head)?;
    header_value(text, "server").map(str::to_string)
}

/// Strict UTF-8, except that a multi-byte character cut off at the end of a
/// partial read is dropped.
fn decode_head(head: &[u8]) -> Option<&str> {
    match std::str::from_utf8(head) {
        Ok(text) => Some(text),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&head[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}

fn host_header(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

/// Offset of the blank line ending an HTTP head, with CRLF or bare LF line endings.
fn header_end(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n");
    let lf = buf.windows(2).position(|w| w == b"\n\n");
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Find the first header line named `name` (case-insensitive) in an HTTP
/// response head and return its trimmed value.
///
/// The status line is skipped and scanning stops at the first blank line.
/// A header with an empty value yields `None`.
pub fn header_value<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    response
        .lines()
        .skip(1)
        .take_while(|line| !line.trim().is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn policy_lookup() {
        for p in GREETING_PORTS {
            assert_eq!(BannerPolicy::for_port(p), BannerPolicy::Greeting);
        }
        assert_eq!(BannerPolicy::for_port(80), BannerPolicy::HttpServerHeader);
        assert_eq!(BannerPolicy::for_port(443), BannerPolicy::Skip);
        assert_eq!(BannerPolicy::for_port(8080), BannerPolicy::Skip);
    }

    #[test]
    fn greeting_is_trimmed_and_prefixed() {
        assert_eq!(
            format_greeting("SSH-2.0-OpenSSH_8.0\r\n"),
            "- SSH-2.0-OpenSSH_8.0"
        );
        assert_eq!(format_greeting(" \r\n"), "");
    }

    #[test]
    fn long_greeting_is_truncated() {
        let raw = "220 ".to_string() + &"x".repeat(80);
        let out = format_greeting(&raw);
        assert!(out.starts_with("- 220 "));
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 2 + MAX_GREETING_CHARS + 3);

        let exact = "y".repeat(MAX_GREETING_CHARS);
        assert_eq!(format_greeting(&exact), format!("- {exact}"));
    }

    #[test]
    fn header_scan_is_case_insensitive() {
        let resp = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nserver:  Apache/2.4 \r\n\r\n";
        assert_eq!(header_value(resp, "Server"), Some("Apache/2.4"));
    }

    #[test]
    fn header_scan_stops_at_blank_line() {
        let resp = "HTTP/1.1 200 OK\r\nX-A: 1\r\n\r\nServer: in-body\r\n";
        assert_eq!(header_value(resp, "server"), None);
        assert_eq!(header_value("Server: nginx\r\n\r\n", "server"), None);
        assert_eq!(header_value("HTTP/1.1 200 OK\r\nServer:\r\n\r\n", "server"), None);
    }

    #[test]
    fn header_scan_takes_first_match() {
        let resp = "HTTP/1.0 301 Moved\nServer: first\nServer: second\n\n";
        assert_eq!(header_value(resp, "server"), Some("first"));
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        assert_eq!(host_header("::1"), "[::1]");
        assert_eq!(host_header("example.com"), "example.com");
    }

    #[tokio::test]
    async fn greeting_timeout_yields_empty() {
        let (mut client, _server) = duplex(64);
        let out = capture_with_policy(
            &mut client,
            BannerPolicy::Greeting,
            "h",
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn non_utf8_greeting_yields_empty() {
        let (mut client, mut server) = duplex(64);
        server.write_all(&[0xff, 0xfe, 0xfd]).await.unwrap();
        let out = capture_with_policy(
            &mut client,
            BannerPolicy::Greeting,
            "h",
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn http_request_carries_host_name() {
        let (mut client, mut server) = duplex(1024);
        let srv = tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            let n = server.read(&mut buf).await.unwrap();
            let req = String::from_utf8_lossy(&buf[..n]).to_string();
            server
                .write_all(b"HTTP/1.1 404 Not Found\r\nServer: test/1\r\n\r\n")
                .await
                .unwrap();
            req
        });
        let out = capture_with_policy(
            &mut client,
            BannerPolicy::HttpServerHeader,
            "scanme.example",
            Duration::from_secs(2),
        )
        .await;
        let req = srv.await.unwrap();
        assert!(req.starts_with("GET / HTTP/1.1\r\n"));
        assert!(req.contains("Host: scanme.example\r\n"));
        assert_eq!(out, "test/1");
    }

    #[tokio::test]
    async fn http_without_server_header_yields_empty() {
        let (mut client, mut server) = duplex(1024);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            let _ = server.read(&mut buf).await;
            let _ = server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        });
        let out = capture_with_policy(
            &mut client,
            BannerPolicy::HttpServerHeader,
            "h",
            Duration::from_secs(2),
        )
        .await;
        assert_eq!(out, "");
    }

    #[test]
    fn head_ends_at_first_blank_line() {
        assert_eq!(header_end(b"HTTP/1.1 200 OK\r\nA: b\r\n\r\nbody"), Some(21));
        assert_eq!(header_end(b"HTTP/1.0 200 OK\nA: b\n\nbody"), Some(20));
        assert_eq!(header_end(b"HTTP/1.0 200 OK\nA: b\n"), None);
    }

    #[test]
    fn cut_off_character_is_dropped_from_head() {
        let mut head = b"HTTP/1.1 200 OK\r\nServer: caf".to_vec();
        head.extend_from_slice(&"\u{e9}".as_bytes()[..1]);
        assert_eq!(decode_head(&head), Some("HTTP/1.1 200 OK\r\nServer: caf"));
        assert_eq!(decode_head(&[0xff, b'a', b'b']), None);
    }

    #[tokio::test]
    async fn lf_only_head_on_held_connection_is_parsed() {
        let (mut client, mut server) = duplex(1024);
        let srv = tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            let _ = server.read(&mut buf).await;
            server
                .write_all(b"HTTP/1.0 200 OK\nServer: tiny/1.0\n\n")
                .await
                .unwrap();
            // Hold the connection open well past the capture timeout.
            time::sleep(Duration::from_secs(5)).await;
            drop(server);
        });
        let start = Instant::now();
        let out = capture_with_policy(
            &mut client,
            BannerPolicy::HttpServerHeader,
            "h",
            Duration::from_millis(500),
        )
        .await;
        assert_eq!(out, "tiny/1.0");
        assert!(start.elapsed() < Duration::from_millis(500));
        srv.abort();
    }

    #[tokio::test]
    async fn partial_head_is_parsed_when_timer_fires() {
        let (mut client, mut server) = duplex(1024);
        let srv = tokio::spawn(async move {
            let mut buf = vec![0u8; 512];
            let _ = server.read(&mut buf).await;
            server
                .write_all(b"HTTP/1.1 200 OK\r\nServer: slow/2.1\r\nX-Pending: ")
                .await
                .unwrap();
            time::sleep(Duration::from_secs(5)).await;
            drop(server);
        });
        let out = capture_with_policy(
            &mut client,
            BannerPolicy::HttpServerHeader,
            "h",
            Duration::from_millis(200),
        )
        .await;
        assert_eq!(out, "slow/2.1");
        srv.abort();
    }

    #[tokio::test]
    async fn skip_policy_does_not_touch_stream() {
        let (mut client, _server) = duplex(64);
        let out = capture_with_policy(&mut client, BannerPolicy::Skip, "h", Duration::from_secs(5)).await;
        assert_eq!(out, "");
    }
}
