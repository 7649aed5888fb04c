use chrono::{DateTime, Local, Utc};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Authority host resolved to a concrete socket target.
#[derive(Clone, Debug)]
pub struct Target {
    pub name: String,
    pub ip: IpAddr,
    pub port: u16,
}

/// One authoritative time sample, already corrected for half the
/// round-trip delay.
#[derive(Clone, Debug)]
pub struct TimeSample {
    pub target: Target,
    /// Fractional Unix seconds at the instant the reply was received.
    pub unix: f64,
    pub rtt_ms: f64,
}

impl TimeSample {
    pub fn utc(&self) -> DateTime<Utc> {
        unix_to_utc(self.unix)
    }

    /// Signed skew of this sample relative to a local reading: positive
    /// means the authority is ahead of the local clock.
    pub fn skew_from(&self, local_unix: f64) -> f64 {
        self.unix - local_unix
    }
}

/// Convert fractional Unix seconds to a UTC datetime.
pub fn unix_to_utc(unix: f64) -> DateTime<Utc> {
    let secs = unix.floor();
    let nanos = ((unix - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Wall-clock state saved before the transaction touches anything.
///
/// Exactly one snapshot exists per transaction. The capture instant is
/// monotonic, so elapsed time stays correct even while the wall clock is
/// stepped around underneath it.
#[derive(Clone, Debug)]
pub struct ClockSnapshot {
    pub original_unix: f64,
    /// Local UTC offset in seconds at capture time.
    pub tz_offset_secs: i32,
    captured: Instant,
}

impl ClockSnapshot {
    pub fn capture(original_unix: f64) -> Self {
        Self {
            original_unix,
            tz_offset_secs: Local::now().offset().local_minus_utc(),
            captured: Instant::now(),
        }
    }

    /// Monotonic time since capture.
    pub fn elapsed(&self) -> Duration {
        self.captured.elapsed()
    }

    /// What the original clock would read now, had it never been touched.
    pub fn restore_target(&self) -> f64 {
        restore_target_at(self.original_unix, self.elapsed())
    }
}

/// Pure form of the restore computation.
pub fn restore_target_at(original_unix: f64, elapsed: Duration) -> f64 {
    original_unix + elapsed.as_secs_f64()
}
