use std::collections::HashSet;

use crate::error::PortSpecError;

/// Well-known TCP ports scanned when no `--ports` list is given.
pub const DEFAULT_PORTS: [u16; 18] = [
    21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 993, 995, 1723, 3306, 3389, 5432, 5900,
];

pub fn default_ports() -> Vec<u16> {
    DEFAULT_PORTS.to_vec()
}

/// Parse a comma-separated port list into TCP ports (1..=65535).
///
/// Supported tokens:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
///
/// Whitespace around tokens is ignored. Duplicates are dropped, keeping the
/// position of the first appearance. Any malformed token fails the whole list.
pub fn parse_port_list(s: &str) -> Result<Vec<u16>, PortSpecError> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for raw in s.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            return Err(PortSpecError::Invalid(raw.to_string()));
        }

        if let Some((a, b)) = token.split_once('-') {
            let start = parse_port(a.trim())?;
            let end = parse_port(b.trim())?;
            if start > end {
                return Err(PortSpecError::ReversedRange { start, end });
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
            continue;
        }

        let p = parse_port(token)?;
        if seen.insert(p) {
            out.push(p);
        }
    }

    if out.is_empty() {
        return Err(PortSpecError::Empty);
    }
    Ok(out)
}

fn parse_port(s: &str) -> Result<u16, PortSpecError> {
    let val: u32 = s
        .parse::<u32>()
        .map_err(|_| PortSpecError::Invalid(s.to_string()))?;
    if val == 0 || val > 65535 {
        return Err(PortSpecError::OutOfRange(val));
    }
    Ok(val as u16)
}
