//! Privileged wall-clock control.
//!
//! Steps the system clock through an ordered chain of write mechanisms:
//! `settimeofday(2)`, then `clock_settime(2)`, then `date(1)` as a last
//! resort. No single mechanism is available in every deployment (containers
//! block syscalls, minimal images lack the utility), so each attempt and
//! its failure reason are kept for the caller.

use std::io;
use thiserror::Error;
use tracing::debug;

/// One entry in the write-attempt log. `error` is `None` for the
/// mechanism that succeeded.
#[derive(Debug, Clone)]
pub struct WriteAttempt {
    pub mechanism: &'static str,
    pub error: Option<String>,
}

/// Successful clock step plus the attempts it took to get there.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub mechanism: &'static str,
    pub attempts: Vec<WriteAttempt>,
}

impl StepOutcome {
    /// Mechanism name, with the failed attempts it fell past when the
    /// first rung did not take.
    pub fn describe(&self) -> String {
        if self.attempts.len() <= 1 {
            return self.mechanism.to_string();
        }
        let failed = self.attempts[..self.attempts.len() - 1]
            .iter()
            .map(|a| {
                format!(
                    "{}: {}",
                    a.mechanism,
                    a.error.as_deref().unwrap_or("ok")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        format!("{} after {}", self.mechanism, failed)
    }
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("need root or CAP_SYS_TIME")]
    Permission,
    #[error("all clock write mechanisms failed: {}", summarize(.0))]
    Exhausted(Vec<WriteAttempt>),
    #[error("clock stepping not supported on this platform")]
    NotSupported,
}

fn summarize(attempts: &[WriteAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            format!(
                "{}: {}",
                a.mechanism,
                a.error.as_deref().unwrap_or("ok")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Narrow interface through which every wall-clock access funnels, so the
/// orchestrator never touches the clock ambiently and tests can swap in a
/// fake.
pub trait ClockControl {
    /// Current wall clock as fractional Unix seconds.
    fn now_unix(&self) -> f64;
    /// Whether the process may step the clock.
    fn privileged(&self) -> bool;
    /// Step the wall clock to `unix`.
    fn apply(&mut self, unix: f64) -> Result<StepOutcome, ClockError>;
}

/// The real system clock. With `dry_run` set, writes are reported as
/// successful without being performed.
#[derive(Debug, Default, Clone)]
pub struct SystemClock {
    dry_run: bool,
}

impl SystemClock {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl ClockControl for SystemClock {
    fn now_unix(&self) -> f64 {
        let now = chrono::Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9
    }

    fn privileged(&self) -> bool {
        self.dry_run || has_time_privilege()
    }

    fn apply(&mut self, unix: f64) -> Result<StepOutcome, ClockError> {
        if self.dry_run {
            debug!(target_unix = unix, "dry-run: not stepping the clock");
            return Ok(StepOutcome {
                mechanism: "dry-run",
                attempts: vec![WriteAttempt {
                    mechanism: "dry-run",
                    error: None,
                }],
            });
        }
        step_system_clock(self.privileged(), unix)
    }
}

#[cfg(unix)]
fn has_time_privilege() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn has_time_privilege() -> bool {
    false
}

/// One write mechanism in the fallback chain.
struct Mechanism {
    label: &'static str,
    run: fn(f64) -> io::Result<()>,
}

/// Try each mechanism in order until one takes the new time. The attempt
/// log records every try, including the winning one.
fn step_clock(
    privileged: bool,
    mechanisms: &[Mechanism],
    unix: f64,
) -> Result<StepOutcome, ClockError> {
    if !privileged {
        return Err(ClockError::Permission);
    }
    let mut attempts = Vec::with_capacity(mechanisms.len());
    for m in mechanisms {
        match (m.run)(unix) {
            Ok(()) => {
                attempts.push(WriteAttempt {
                    mechanism: m.label,
                    error: None,
                });
                debug!(mechanism = m.label, target_unix = unix, "clock stepped");
                return Ok(StepOutcome {
                    mechanism: m.label,
                    attempts,
                });
            }
            Err(e) => {
                debug!(mechanism = m.label, error = %e, "clock write mechanism failed");
                attempts.push(WriteAttempt {
                    mechanism: m.label,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    Err(ClockError::Exhausted(attempts))
}

#[cfg(unix)]
fn step_system_clock(privileged: bool, unix: f64) -> Result<StepOutcome, ClockError> {
    const MECHANISMS: &[Mechanism] = &[
        Mechanism {
            label: "settimeofday",
            run: set_via_settimeofday,
        },
        Mechanism {
            label: "clock_settime",
            run: set_via_clock_settime,
        },
        Mechanism {
            label: "date(1)",
            run: set_via_date_utility,
        },
    ];
    step_clock(privileged, MECHANISMS, unix)
}

#[cfg(not(unix))]
fn step_system_clock(_privileged: bool, _unix: f64) -> Result<StepOutcome, ClockError> {
    Err(ClockError::NotSupported)
}

/// Split fractional Unix seconds into whole seconds and a non-negative
/// sub-second fraction.
#[cfg(unix)]
fn split_unix(unix: f64) -> (i64, f64) {
    let secs = unix.floor();
    (secs as i64, unix - secs)
}

#[cfg(unix)]
fn set_via_settimeofday(unix: f64) -> io::Result<()> {
    let (secs, frac) = split_unix(unix);
    let tv = libc::timeval {
        tv_sec: secs as libc::time_t,
        tv_usec: (frac * 1e6) as libc::suseconds_t,
    };
    let rc = unsafe { libc::settimeofday(&tv, std::ptr::null()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(unix)]
fn set_via_clock_settime(unix: f64) -> io::Result<()> {
    let (secs, frac) = split_unix(unix);
    let ts = libc::timespec {
        tv_sec: secs as libc::time_t,
        tv_nsec: (frac * 1e9) as libc::c_long,
    };
    let rc = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &ts) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// `date(1)` takes local time as `MMDDhhmmYYYY.SS`.
#[cfg(unix)]
fn date_stamp(unix: f64) -> Option<String> {
    use chrono::TimeZone;
    let (secs, _) = split_unix(unix);
    chrono::Local
        .timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format("%m%d%H%M%Y.%S").to_string())
}

#[cfg(unix)]
fn set_via_date_utility(unix: f64) -> io::Result<()> {
    let stamp = date_stamp(unix).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "timestamp out of range for date(1)")
    })?;
    let out = std::process::Command::new("date").arg(&stamp).output()?;
    if !out.status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deny(_: f64) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "blocked"))
    }

    fn accept(_: f64) -> io::Result<()> {
        Ok(())
    }

    #[test]
    fn first_success_wins_without_trying_the_rest() {
        let chain = [
            Mechanism { label: "a", run: accept },
            Mechanism { label: "b", run: deny },
        ];
        let out = step_clock(true, &chain, 1000.0).unwrap();
        assert_eq!(out.mechanism, "a");
        assert_eq!(out.attempts.len(), 1);
    }

    #[test]
    fn falls_through_to_third_mechanism_with_full_log() {
        let chain = [
            Mechanism { label: "a", run: deny },
            Mechanism { label: "b", run: deny },
            Mechanism { label: "c", run: accept },
        ];
        let out = step_clock(true, &chain, 1000.0).unwrap();
        assert_eq!(out.mechanism, "c");
        assert_eq!(out.attempts.len(), 3);
        assert!(out.attempts[0].error.is_some());
        assert!(out.attempts[1].error.is_some());
        assert!(out.attempts[2].error.is_none());
        let text = out.describe();
        assert!(text.starts_with("c after "));
        assert!(text.contains("a: blocked") && text.contains("b: blocked"));
    }

    #[test]
    fn describe_is_just_the_name_for_a_first_try_win() {
        let chain = [Mechanism { label: "a", run: accept }];
        let out = step_clock(true, &chain, 1000.0).unwrap();
        assert_eq!(out.describe(), "a");
    }

    #[test]
    fn exhaustion_reports_every_mechanism() {
        let chain = [
            Mechanism { label: "a", run: deny },
            Mechanism { label: "b", run: deny },
            Mechanism { label: "c", run: deny },
        ];
        let err = step_clock(true, &chain, 1000.0).unwrap_err();
        match err {
            ClockError::Exhausted(attempts) => {
                assert_eq!(attempts.len(), 3);
                assert!(attempts.iter().all(|a| a.error.is_some()));
                let text = summarize(&attempts);
                assert!(text.contains("a:") && text.contains("b:") && text.contains("c:"));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    fn never(_: f64) -> io::Result<()> {
        panic!("mechanism must not run without privilege");
    }

    #[test]
    fn unprivileged_refuses_before_any_attempt() {
        let chain = [Mechanism { label: "a", run: never }];
        let err = step_clock(false, &chain, 1000.0).unwrap_err();
        assert!(matches!(err, ClockError::Permission));
    }

    #[test]
    fn dry_run_clock_pretends_to_step() {
        let mut clock = SystemClock::new(true);
        assert!(clock.privileged());
        let out = clock.apply(1_703_356_878.0).unwrap();
        assert_eq!(out.mechanism, "dry-run");
    }

    #[cfg(unix)]
    #[test]
    fn date_stamp_has_the_expected_shape() {
        let stamp = date_stamp(1_703_356_878.0).unwrap();
        // MMDDhhmmYYYY.SS
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[12], b'.');
        assert!(stamp[..12].bytes().all(|b| b.is_ascii_digit()));
        assert!(stamp[13..].bytes().all(|b| b.is_ascii_digit()));
    }

    #[cfg(unix)]
    #[test]
    fn split_unix_keeps_fraction_non_negative() {
        let (secs, frac) = split_unix(10.25);
        assert_eq!(secs, 10);
        assert!((frac - 0.25).abs() < 1e-9);
        let (secs, frac) = split_unix(-0.5);
        assert_eq!(secs, -1);
        assert!((frac - 0.5).abs() < 1e-9);
    }
}
