use crate::domain::time::TimeSample;

/// Why the query stage failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryFailure {
    Resolve,
    Timeout,
    Malformed,
    Network,
}

/// Why a clock write failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyFailure {
    Permission,
    Exhausted,
    Unsupported,
}

/// Outcome of the save-and-sync stage.
#[derive(Clone, Debug)]
pub enum SyncOutcome {
    /// Clock stepped onto the authority sample.
    Stepped {
        sample: TimeSample,
        skew_secs: f64,
        mechanism: String,
    },
    /// Skew below threshold, clock left untouched.
    InSync { sample: TimeSample, skew_secs: f64 },
    QueryFailed {
        kind: QueryFailure,
        error: String,
    },
    /// Sample obtained but no write mechanism took it.
    ApplyFailed {
        sample: TimeSample,
        skew_secs: f64,
        kind: ApplyFailure,
        error: String,
    },
    Interrupted,
}

impl SyncOutcome {
    pub fn sample(&self) -> Option<&TimeSample> {
        match self {
            SyncOutcome::Stepped { sample, .. }
            | SyncOutcome::InSync { sample, .. }
            | SyncOutcome::ApplyFailed { sample, .. } => Some(sample),
            _ => None,
        }
    }

    /// True when the clock now matches the authority.
    pub fn synced(&self) -> bool {
        matches!(
            self,
            SyncOutcome::Stepped { .. } | SyncOutcome::InSync { .. }
        )
    }
}

/// Outcome of the command stage.
#[derive(Clone, Debug)]
pub enum CommandOutcome {
    Succeeded,
    Failed,
    SpawnFailed { error: String },
    Skipped { reason: String },
    Interrupted,
}

/// Outcome of the restore stage.
#[derive(Clone, Debug)]
pub enum RestoreOutcome {
    /// Clock stepped back onto the recomputed original time.
    Stepped { target_unix: f64, mechanism: String },
    /// Clock already within tolerance of the target, nothing written.
    InSync { target_unix: f64 },
    /// Every write mechanism refused; `target_unix` is the best-known
    /// original time for manual correction.
    Failed {
        target_unix: f64,
        kind: ApplyFailure,
        error: String,
    },
}

/// Full record of one save -> sync -> execute -> restore transaction.
#[derive(Clone, Debug)]
pub struct TransactionReport {
    pub authority: String,
    pub command_line: String,
    /// Wall clock at snapshot time, before anything was touched.
    pub original_unix: f64,
    /// Local UTC offset in seconds at snapshot time.
    pub tz_offset_secs: i32,
    pub sync: SyncOutcome,
    pub command: CommandOutcome,
    pub restore: RestoreOutcome,
    pub interrupted: bool,
}

impl TransactionReport {
    pub fn command_succeeded(&self) -> bool {
        matches!(self.command, CommandOutcome::Succeeded)
    }
}
