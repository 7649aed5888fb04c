//! Minimal one-shot SNTP query client.
//!
//! One 48-byte request, one reply, one adjusted timestamp. No retries, no
//! multi-sample filtering; retry policy belongs to the caller.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::adapters::resolver;
use crate::domain::time::{Target, TimeSample};
use crate::error::SkewrunError;

/// Fixed request/response length in bytes.
pub const PACKET_LEN: usize = 48;
/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const NTP_UNIX_OFFSET: u32 = 2_208_988_800;
/// Default authority port.
pub const DEFAULT_PORT: u16 = 123;

/// LI=0, VN=3, Mode=3: a version 3 client request.
const CLIENT_REQUEST_HEADER: u8 = 0x1B;
/// Byte offset of the transmit timestamp within the reply.
const TRANSMIT_OFFSET: usize = 40;
/// One unit of the 32-bit fractional-seconds field.
const FRAC_UNIT: f64 = 4_294_967_296.0;

fn request_packet() -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    buf[0] = CLIENT_REQUEST_HEADER;
    buf
}

/// Extract (seconds, fraction) of the transmit timestamp from a reply.
fn transmit_timestamp(response: &[u8]) -> Result<(u32, u32), SkewrunError> {
    if response.len() < PACKET_LEN {
        return Err(SkewrunError::Protocol(format!(
            "short response: {} bytes, need {}",
            response.len(),
            PACKET_LEN
        )));
    }
    let b = &response[TRANSMIT_OFFSET..TRANSMIT_OFFSET + 8];
    let secs = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
    let frac = u32::from_be_bytes([b[4], b[5], b[6], b[7]]);
    Ok((secs, frac))
}

/// Convert a transmit timestamp into fractional Unix seconds, corrected
/// for one-way network latency by half the measured round trip.
pub fn adjusted_unix(secs: u32, frac: u32, rtt: Duration) -> f64 {
    let unix = (f64::from(secs) - f64::from(NTP_UNIX_OFFSET)) + f64::from(frac) / FRAC_UNIT;
    unix - rtt.as_secs_f64() / 2.0
}

/// Fire one request at `addr` and wait for the reply.
///
/// Returns the adjusted Unix timestamp and the measured round trip.
pub async fn query(addr: SocketAddr, timeout: Duration) -> Result<(f64, Duration), SkewrunError> {
    let bind = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
    let socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| SkewrunError::Network(e.to_string()))?;
    socket
        .connect(addr)
        .await
        .map_err(|e| SkewrunError::Network(e.to_string()))?;

    let request = request_packet();
    let sent_at = Instant::now();
    socket
        .send(&request)
        .await
        .map_err(|e| SkewrunError::Network(e.to_string()))?;

    let mut buf = [0u8; 160];
    let n = tokio::time::timeout(timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| SkewrunError::Timeout(timeout))?
        .map_err(|e| SkewrunError::Network(e.to_string()))?;
    let rtt = sent_at.elapsed();

    let (secs, frac) = transmit_timestamp(&buf[..n])?;
    debug!(
        secs,
        frac,
        rtt_ms = rtt.as_secs_f64() * 1000.0,
        "authority replied"
    );
    Ok((adjusted_unix(secs, frac, rtt), rtt))
}

/// A source of authoritative time the orchestrator can query.
pub trait TimeAuthority {
    /// Display name of the authority, as given by the operator.
    fn name(&self) -> &str;

    fn query(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<TimeSample, SkewrunError>>;
}

/// SNTP authority addressed by hostname or IP, with an optional
/// `host:port` override.
#[derive(Debug, Clone)]
pub struct SntpAuthority {
    pub target: String,
    pub ipv6: bool,
}

impl SntpAuthority {
    pub fn new(target: impl Into<String>, ipv6: bool) -> Self {
        Self {
            target: target.into(),
            ipv6,
        }
    }
}

impl TimeAuthority for SntpAuthority {
    fn name(&self) -> &str {
        &self.target
    }

    async fn query(&self, timeout: Duration) -> Result<TimeSample, SkewrunError> {
        let parsed = resolver::parse_target(&self.target)?;
        let port = parsed.port.unwrap_or(DEFAULT_PORT);
        let ipv6 = self.ipv6 || parsed.is_ipv6_literal;
        let ip = resolver::resolve_ip(parsed.host, port, ipv6)?;
        debug!(host = parsed.host, %ip, port, "querying authority");

        let (unix, rtt) = query(SocketAddr::new(ip, port), timeout).await?;
        Ok(TimeSample {
            target: Target {
                name: self.target.clone(),
                ip,
                port,
            },
            unix,
            rtt_ms: rtt.as_secs_f64() * 1000.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_48_bytes_of_client_mode() {
        let pkt = request_packet();
        assert_eq!(pkt.len(), PACKET_LEN);
        assert_eq!(pkt[0], 0x1B);
        assert!(pkt[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn short_responses_never_yield_a_timestamp() {
        for len in 0..PACKET_LEN {
            let buf = vec![0u8; len];
            let err = transmit_timestamp(&buf).expect_err("short response must fail");
            assert!(matches!(err, SkewrunError::Protocol(_)), "len {len}");
        }
    }

    #[test]
    fn transmit_timestamp_reads_offset_40_big_endian() {
        let mut buf = [0u8; PACKET_LEN];
        buf[40..44].copy_from_slice(&3_912_345_678u32.to_be_bytes());
        buf[44..48].copy_from_slice(&0x8000_0000u32.to_be_bytes());
        let (secs, frac) = transmit_timestamp(&buf).unwrap();
        assert_eq!(secs, 3_912_345_678);
        assert_eq!(frac, 0x8000_0000);
    }

    #[test]
    fn adjusted_unix_matches_closed_form_fixtures() {
        // (secs, frac, rtt_ms, expected unix)
        let fixtures: &[(u32, u32, u64, f64)] = &[
            (NTP_UNIX_OFFSET, 0, 0, 0.0),
            (NTP_UNIX_OFFSET, 0x8000_0000, 0, 0.5),
            (NTP_UNIX_OFFSET + 1, 0x4000_0000, 0, 1.25),
            (3_912_345_678, 0, 0, 1_703_356_878.0),
            (3_912_345_678, 0, 200, 1_703_356_878.0 - 0.1),
        ];
        for &(secs, frac, rtt_ms, expected) in fixtures {
            let got = adjusted_unix(secs, frac, Duration::from_millis(rtt_ms));
            assert!(
                (got - expected).abs() < 1e-6,
                "secs={secs} frac={frac} rtt={rtt_ms}ms: got {got}, expected {expected}"
            );
        }
    }
}
