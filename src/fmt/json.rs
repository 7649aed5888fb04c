#[cfg(feature = "json")]
use serde::Serialize;

use crate::domain::report::TransactionReport;
use crate::error::SkewrunError;

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonSync {
    pub status: String,
    pub failure_kind: Option<String>,
    pub skew_secs: Option<f64>,
    pub rtt_ms: Option<f64>,
    pub authority_ip: Option<String>,
    pub authority_utc: Option<String>,
    pub mechanism: Option<String>,
    pub error: Option<String>,
}

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonCommand {
    pub status: String,
    pub detail: Option<String>,
}

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonRestore {
    pub status: String,
    pub target_unix: f64,
    pub target_utc: String,
    pub mechanism: Option<String>,
    pub error: Option<String>,
}

#[cfg(feature = "json")]
#[derive(Serialize)]
pub struct JsonReport {
    pub schema_version: u8,
    pub authority: String,
    pub command_line: String,
    pub original_unix: f64,
    pub original_utc: String,
    pub tz_offset_secs: i32,
    pub interrupted: bool,
    pub sync: JsonSync,
    pub command: JsonCommand,
    pub restore: JsonRestore,
}

/// Serialize a transaction report into a JSON string.
#[allow(unused_variables)]
pub fn to_json(report: &TransactionReport, pretty: bool) -> Result<String, SkewrunError> {
    #[cfg(feature = "json")]
    {
        use crate::domain::report::{CommandOutcome, RestoreOutcome, SyncOutcome};
        use crate::domain::time::unix_to_utc;

        let sample = report.sync.sample();
        let sync = match &report.sync {
            SyncOutcome::Stepped {
                skew_secs,
                mechanism,
                ..
            } => JsonSync {
                status: "stepped".into(),
                failure_kind: None,
                skew_secs: Some(*skew_secs),
                rtt_ms: sample.map(|s| s.rtt_ms),
                authority_ip: sample.map(|s| s.target.ip.to_string()),
                authority_utc: sample.map(|s| s.utc().to_rfc3339()),
                mechanism: Some(mechanism.clone()),
                error: None,
            },
            SyncOutcome::InSync { skew_secs, .. } => JsonSync {
                status: "in_sync".into(),
                failure_kind: None,
                skew_secs: Some(*skew_secs),
                rtt_ms: sample.map(|s| s.rtt_ms),
                authority_ip: sample.map(|s| s.target.ip.to_string()),
                authority_utc: sample.map(|s| s.utc().to_rfc3339()),
                mechanism: None,
                error: None,
            },
            SyncOutcome::QueryFailed { kind, error } => JsonSync {
                status: "query_failed".into(),
                failure_kind: Some(format!("{kind:?}").to_lowercase()),
                skew_secs: None,
                rtt_ms: None,
                authority_ip: None,
                authority_utc: None,
                mechanism: None,
                error: Some(error.clone()),
            },
            SyncOutcome::ApplyFailed {
                skew_secs,
                kind,
                error,
                ..
            } => JsonSync {
                status: "apply_failed".into(),
                failure_kind: Some(format!("{kind:?}").to_lowercase()),
                skew_secs: Some(*skew_secs),
                rtt_ms: sample.map(|s| s.rtt_ms),
                authority_ip: sample.map(|s| s.target.ip.to_string()),
                authority_utc: sample.map(|s| s.utc().to_rfc3339()),
                mechanism: None,
                error: Some(error.clone()),
            },
            SyncOutcome::Interrupted => JsonSync {
                status: "interrupted".into(),
                failure_kind: None,
                skew_secs: None,
                rtt_ms: None,
                authority_ip: None,
                authority_utc: None,
                mechanism: None,
                error: None,
            },
        };

        let command = match &report.command {
            CommandOutcome::Succeeded => JsonCommand {
                status: "succeeded".into(),
                detail: None,
            },
            CommandOutcome::Failed => JsonCommand {
                status: "failed".into(),
                detail: None,
            },
            CommandOutcome::SpawnFailed { error } => JsonCommand {
                status: "spawn_failed".into(),
                detail: Some(error.clone()),
            },
            CommandOutcome::Skipped { reason } => JsonCommand {
                status: "skipped".into(),
                detail: Some(reason.clone()),
            },
            CommandOutcome::Interrupted => JsonCommand {
                status: "interrupted".into(),
                detail: None,
            },
        };

        let restore = match &report.restore {
            RestoreOutcome::Stepped {
                target_unix,
                mechanism,
            } => JsonRestore {
                status: "stepped".into(),
                target_unix: *target_unix,
                target_utc: unix_to_utc(*target_unix).to_rfc3339(),
                mechanism: Some(mechanism.clone()),
                error: None,
            },
            RestoreOutcome::InSync { target_unix } => JsonRestore {
                status: "in_sync".into(),
                target_unix: *target_unix,
                target_utc: unix_to_utc(*target_unix).to_rfc3339(),
                mechanism: None,
                error: None,
            },
            RestoreOutcome::Failed {
                target_unix, error, ..
            } => JsonRestore {
                status: "failed".into(),
                target_unix: *target_unix,
                target_utc: unix_to_utc(*target_unix).to_rfc3339(),
                mechanism: None,
                error: Some(error.clone()),
            },
        };

        let run = JsonReport {
            schema_version: 1,
            authority: report.authority.clone(),
            command_line: report.command_line.clone(),
            original_unix: report.original_unix,
            original_utc: unix_to_utc(report.original_unix).to_rfc3339(),
            tz_offset_secs: report.tz_offset_secs,
            interrupted: report.interrupted,
            sync,
            command,
            restore,
        };
        let text = if pretty {
            serde_json::to_string_pretty(&run).map_err(|e| SkewrunError::Other(e.to_string()))?
        } else {
            serde_json::to_string(&run).map_err(|e| SkewrunError::Other(e.to_string()))?
        };
        Ok(text)
    }
    #[cfg(not(feature = "json"))]
    {
        let _ = report;
        let _ = pretty;
        Err(SkewrunError::Other("json feature disabled".into()))
    }
}
