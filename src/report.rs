use std::fmt::Write as _;

use crate::types::{PortResult, ScanReport};

/// Common service name for a well-known port, or `"Unknown"`.
pub fn service_name(port: u16) -> &'static str {
    match port {
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        135 => "RPC",
        139 => "NetBIOS",
        143 => "IMAP",
        443 => "HTTPS",
        993 => "IMAPS",
        995 => "POP3S",
        1723 => "PPTP",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        _ => "Unknown",
    }
}

/// One table row for an open port: right-aligned port, service name, banner.
pub fn format_open_line(port: u16, banner: &str) -> String {
    format!("  {:>5} | {:<15} | {}", port, service_name(port), banner)
        .trim_end()
        .to_string()
}

/// Progress line printed as soon as an open port is found.
pub fn format_hit_line(result: &PortResult) -> String {
    format!("[+] Port {}: Open {}", result.port, result.banner)
        .trim_end()
        .to_string()
}

/// Render the end-of-scan summary shown on stdout.
pub fn render_summary(report: &ScanReport) -> String {
    let mut out = String::new();
    let open: Vec<_> = report.open().collect();

    let _ = writeln!(out, "{}", "-".repeat(40));
    let _ = writeln!(
        out,
        "Scan completed in {:.2}s",
        report.elapsed_ms as f64 / 1000.0
    );
    let _ = writeln!(out, "Found {} open ports:", open.len());

    if open.is_empty() {
        let _ = writeln!(out, "No open ports found.");
        return out;
    }

    let _ = writeln!(out, "\nOpen Ports Summary:");
    for r in open {
        let _ = writeln!(out, "{}", format_open_line(r.port, &r.banner));
    }
    out
}
