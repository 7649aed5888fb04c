//! skewrun library: one-shot clock-override transactions.
//!
//! Save the wall clock, step it to an authoritative SNTP sample, run a
//! command under the corrected clock, and restore the original clock on
//! every exit path.

pub mod adapters;
pub mod domain;
mod error;
pub mod fmt;
pub mod services;

pub use adapters::clock::{ClockControl, ClockError, StepOutcome, SystemClock, WriteAttempt};
pub use adapters::runner::{CommandRunner, ShellRunner};
pub use adapters::sntp::{SntpAuthority, TimeAuthority};
pub use domain::report::{
    ApplyFailure, CommandOutcome, QueryFailure, RestoreOutcome, SyncOutcome, TransactionReport,
};
pub use domain::time::{ClockSnapshot, Target, TimeSample};
pub use error::SkewrunError;
pub use services::transaction::{TransactionOpts, run_transaction};
