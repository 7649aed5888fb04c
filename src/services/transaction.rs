//! The save -> sync -> execute -> restore transaction.
//!
//! The snapshot is taken before anything mutates, and the restore stage
//! runs on every path out of the transaction: normal completion, any
//! stage failure, or an interrupt. Only the sync and command stages are
//! raced against the interrupt; restore never is.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::adapters::clock::{ClockControl, ClockError};
use crate::adapters::runner::CommandRunner;
use crate::adapters::sntp::TimeAuthority;
use crate::domain::report::{
    ApplyFailure, CommandOutcome, QueryFailure, RestoreOutcome, SyncOutcome, TransactionReport,
};
use crate::domain::time::ClockSnapshot;
use crate::error::SkewrunError;

/// Skews below this many seconds are not worth a clock write.
pub const SKEW_STEP_THRESHOLD: f64 = 0.1;

/// Default bound on the authority round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TransactionOpts {
    pub timeout: Duration,
    /// Skews and restore drifts below this many seconds skip the write.
    pub skip_threshold: f64,
    /// Run the command even when the authority query failed.
    pub force: bool,
}

impl Default for TransactionOpts {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            skip_threshold: SKEW_STEP_THRESHOLD,
            force: false,
        }
    }
}

/// Run one full transaction. `interrupt` is an external cancellation
/// signal (typically Ctrl-C); once it fires, remaining stages are skipped
/// but the restore still runs.
pub async fn run_transaction<A, C, R, I>(
    authority: &A,
    clock: &mut C,
    runner: &R,
    command_line: &str,
    opts: &TransactionOpts,
    interrupt: I,
) -> TransactionReport
where
    A: TimeAuthority,
    C: ClockControl,
    R: CommandRunner,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    // Snapshot before any mutation.
    let snapshot = ClockSnapshot::capture(clock.now_unix());
    debug!(
        original_unix = snapshot.original_unix,
        tz_offset_secs = snapshot.tz_offset_secs,
        "wall clock saved"
    );

    let mut interrupted = false;

    let sync = tokio::select! {
        biased;
        _ = &mut interrupt => {
            interrupted = true;
            info!("interrupted before synchronization finished");
            SyncOutcome::Interrupted
        }
        outcome = sync_stage(authority, clock, opts) => outcome,
    };

    let command = if interrupted {
        CommandOutcome::Skipped {
            reason: "interrupted".into(),
        }
    } else if matches!(sync, SyncOutcome::QueryFailed { .. }) && !opts.force {
        CommandOutcome::Skipped {
            reason: "authority query failed (pass --force to run anyway)".into(),
        }
    } else {
        info!(command = command_line, "executing command");
        tokio::select! {
            biased;
            _ = &mut interrupt => {
                interrupted = true;
                info!("interrupted while the command was running");
                CommandOutcome::Interrupted
            }
            res = runner.run(command_line) => match res {
                Ok(true) => CommandOutcome::Succeeded,
                Ok(false) => CommandOutcome::Failed,
                Err(e) => CommandOutcome::SpawnFailed { error: e.to_string() },
            },
        }
    };

    // Restore runs unconditionally and is never raced against the
    // interrupt; a second Ctrl-C here is not intercepted.
    let restore = restore_stage(clock, &snapshot, opts);

    TransactionReport {
        authority: authority.name().to_string(),
        command_line: command_line.to_string(),
        original_unix: snapshot.original_unix,
        tz_offset_secs: snapshot.tz_offset_secs,
        sync,
        command,
        restore,
        interrupted,
    }
}

async fn sync_stage<A, C>(authority: &A, clock: &mut C, opts: &TransactionOpts) -> SyncOutcome
where
    A: TimeAuthority,
    C: ClockControl,
{
    let sample = match authority.query(opts.timeout).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "authority query failed");
            return SyncOutcome::QueryFailed {
                kind: classify_query(&e),
                error: e.to_string(),
            };
        }
    };

    let skew = sample.skew_from(clock.now_unix());
    if skew.abs() < opts.skip_threshold {
        info!(skew_secs = skew, "skew negligible, leaving the clock alone");
        return SyncOutcome::InSync {
            sample,
            skew_secs: skew,
        };
    }

    info!(
        skew_secs = skew,
        authority_unix = sample.unix,
        "stepping clock to authority time"
    );
    match clock.apply(sample.unix) {
        Ok(step) => SyncOutcome::Stepped {
            sample,
            skew_secs: skew,
            mechanism: step.describe(),
        },
        Err(e) => {
            warn!(error = %e, "could not step the clock");
            SyncOutcome::ApplyFailed {
                sample,
                skew_secs: skew,
                kind: classify_apply(&e),
                error: e.to_string(),
            }
        }
    }
}

fn restore_stage<C: ClockControl>(
    clock: &mut C,
    snapshot: &ClockSnapshot,
    opts: &TransactionOpts,
) -> RestoreOutcome {
    let target = snapshot.restore_target();
    let drift = target - clock.now_unix();
    if drift.abs() < opts.skip_threshold {
        debug!(
            target_unix = target,
            "clock already within tolerance of its original value"
        );
        return RestoreOutcome::InSync {
            target_unix: target,
        };
    }
    match clock.apply(target) {
        Ok(step) => {
            info!(
                target_unix = target,
                mechanism = step.mechanism,
                "original clock restored"
            );
            RestoreOutcome::Stepped {
                target_unix: target,
                mechanism: step.describe(),
            }
        }
        Err(e) => {
            warn!(
                target_unix = target,
                error = %e,
                "could not restore the original clock, manual correction needed"
            );
            RestoreOutcome::Failed {
                target_unix: target,
                kind: classify_apply(&e),
                error: e.to_string(),
            }
        }
    }
}

fn classify_query(e: &SkewrunError) -> QueryFailure {
    match e {
        SkewrunError::Dns(_) => QueryFailure::Resolve,
        SkewrunError::Timeout(_) => QueryFailure::Timeout,
        SkewrunError::Protocol(_) => QueryFailure::Malformed,
        _ => QueryFailure::Network,
    }
}

fn classify_apply(e: &ClockError) -> ApplyFailure {
    match e {
        ClockError::Permission => ApplyFailure::Permission,
        ClockError::Exhausted(_) => ApplyFailure::Exhausted,
        ClockError::NotSupported => ApplyFailure::Unsupported,
    }
}
