//! Authority address parsing and DNS resolution.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::SkewrunError;

/// Parsed view of an authority string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTarget<'a> {
    pub host: &'a str,
    pub port: Option<u16>,
    pub is_ipv6_literal: bool,
}

/// Strict port parsing with range check (1..=65535).
fn parse_port_strict(s: &str) -> Result<u16, SkewrunError> {
    let raw = u32::from_str(s).map_err(|_| SkewrunError::Other(format!("invalid port: '{s}'")))?;
    if raw == 0 || raw > u16::MAX as u32 {
        return Err(SkewrunError::Other(format!(
            "port out of range [1..65535]: {raw}"
        )));
    }
    Ok(raw as u16)
}

#[inline]
fn colon_count(s: &str) -> usize {
    s.as_bytes().iter().filter(|&&b| b == b':').count()
}

/// Parse an authority string without regexes.
///
/// Supported forms: `hostname`, `hostname:123`, `1.2.3.4`, `1.2.3.4:123`,
/// `[2001:db8::1]`, `[2001:db8::1]:123`, and bare IPv6 (no port). With
/// more than one `:` and no brackets the input is treated as bare IPv6.
pub fn parse_target(input: &str) -> Result<ParsedTarget<'_>, SkewrunError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(SkewrunError::Other("empty authority".into()));
    }

    // Bracketed IPv6: "[v6]" or "[v6]:port"
    if let Some(rest) = s.strip_prefix('[') {
        let Some(bracket_pos) = rest.find(']') else {
            return Err(SkewrunError::Other(format!("missing closing ']' in '{s}'")));
        };
        let host = &rest[..bracket_pos];
        let tail = &rest[bracket_pos + 1..];

        let port = if let Some(p) = tail.strip_prefix(':') {
            Some(parse_port_strict(p)?)
        } else if tail.is_empty() {
            None
        } else {
            return Err(SkewrunError::Other(format!(
                "unexpected trailing characters in '{s}'"
            )));
        };

        return Ok(ParsedTarget {
            host,
            port,
            is_ipv6_literal: true,
        });
    }

    match colon_count(s) {
        0 => Ok(ParsedTarget {
            host: s,
            port: None,
            is_ipv6_literal: false,
        }),
        1 => {
            let mut it = s.rsplitn(2, ':');
            let port_str = it.next().unwrap_or("");
            let host = it.next().unwrap_or("");
            if host.is_empty() {
                return Err(SkewrunError::Other(format!(
                    "missing host before port in '{s}'"
                )));
            }
            let port = parse_port_strict(port_str)?;
            Ok(ParsedTarget {
                host,
                port: Some(port),
                is_ipv6_literal: false,
            })
        }
        _ => Ok(ParsedTarget {
            host: s,
            port: None,
            is_ipv6_literal: true,
        }),
    }
}

/// Resolve the IP address for a host name according to IPv4/IPv6 mode.
/// IPv4 addresses win unless `ipv6_only` is set.
pub fn resolve_ip(host: &str, port: u16, ipv6_only: bool) -> Result<IpAddr, SkewrunError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| SkewrunError::Dns(format!("resolution failed for '{host}': {e}")))?
        .collect();

    let filtered: Vec<IpAddr> = if ipv6_only {
        addrs
            .iter()
            .map(|a| a.ip())
            .filter(|ip| ip.is_ipv6())
            .collect()
    } else {
        let mut v4 = vec![];
        let mut v6 = vec![];
        for a in addrs {
            let ip = a.ip();
            if ip.is_ipv4() {
                v4.push(ip);
            } else {
                v6.push(ip);
            }
        }
        v4.into_iter().chain(v6).collect()
    };

    filtered.into_iter().next().ok_or_else(|| {
        if ipv6_only {
            SkewrunError::Dns(format!("no IPv6 address found for '{host}'"))
        } else {
            SkewrunError::Dns(format!("no IP address found for '{host}'"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_hostname() {
        let t = parse_target("dc01.corp.example").unwrap();
        assert_eq!(t.host, "dc01.corp.example");
        assert_eq!(t.port, None);
        assert!(!t.is_ipv6_literal);
    }

    #[test]
    fn host_with_port() {
        let t = parse_target("10.0.0.1:1123").unwrap();
        assert_eq!(t.host, "10.0.0.1");
        assert_eq!(t.port, Some(1123));
    }

    #[test]
    fn bracketed_ipv6_with_port() {
        let t = parse_target("[2001:db8::1]:123").unwrap();
        assert_eq!(t.host, "2001:db8::1");
        assert_eq!(t.port, Some(123));
        assert!(t.is_ipv6_literal);
    }

    #[test]
    fn bare_ipv6_has_no_port() {
        let t = parse_target("2001:db8::1").unwrap();
        assert_eq!(t.host, "2001:db8::1");
        assert_eq!(t.port, None);
        assert!(t.is_ipv6_literal);
    }

    #[test]
    fn rejects_bad_ports_and_empty_input() {
        assert!(parse_target("").is_err());
        assert!(parse_target("host:0").is_err());
        assert!(parse_target("host:70000").is_err());
        assert!(parse_target(":123").is_err());
        assert!(parse_target("[2001:db8::1").is_err());
    }

    #[test]
    fn resolves_loopback_literal() {
        let ip = resolve_ip("127.0.0.1", 123, false).unwrap();
        assert!(ip.is_ipv4());
    }
}
