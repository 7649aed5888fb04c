use console::style;

use crate::domain::report::{
    CommandOutcome, RestoreOutcome, SyncOutcome, TransactionReport,
};
use crate::domain::time::unix_to_utc;

fn format_unix(unix: f64) -> String {
    unix_to_utc(unix).format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string()
}

fn format_tz_offset(secs: i32) -> String {
    let sign = if secs < 0 { '-' } else { '+' };
    let s = secs.unsigned_abs();
    format!("UTC{sign}{:02}:{:02}", s / 3600, (s % 3600) / 60)
}

/// Render a transaction report into human readable text.
pub fn render_report(r: &TransactionReport, verbose: bool) -> String {
    let mut out = format!(
        "{} {}\n",
        style("Authority:").cyan().bold(),
        style(&r.authority).green()
    );

    let sync_val = match &r.sync {
        SyncOutcome::Stepped {
            skew_secs,
            mechanism,
            ..
        } => style(format!("stepped {skew_secs:+.3} s ({mechanism})"))
            .green()
            .to_string(),
        SyncOutcome::InSync { skew_secs, .. } => {
            style(format!("already in sync ({:+.1} ms)", skew_secs * 1000.0))
                .green()
                .to_string()
        }
        SyncOutcome::QueryFailed { error, .. } => {
            style(format!("query failed: {error}")).red().to_string()
        }
        SyncOutcome::ApplyFailed { error, .. } => {
            style(format!("apply failed: {error}")).red().to_string()
        }
        SyncOutcome::Interrupted => style("interrupted").yellow().to_string(),
    };
    out.push_str(&format!("{} {}\n", style("Sync:").cyan().bold(), sync_val));

    let cmd_val = match &r.command {
        CommandOutcome::Succeeded => style("succeeded").green().to_string(),
        CommandOutcome::Failed => style("failed").red().to_string(),
        CommandOutcome::SpawnFailed { error } => {
            style(format!("could not spawn: {error}")).red().to_string()
        }
        CommandOutcome::Skipped { reason } => {
            style(format!("skipped ({reason})")).yellow().to_string()
        }
        CommandOutcome::Interrupted => style("interrupted").yellow().to_string(),
    };
    out.push_str(&format!(
        "{} {}\n",
        style("Command:").cyan().bold(),
        cmd_val
    ));

    let restore_val = match &r.restore {
        RestoreOutcome::Stepped {
            target_unix,
            mechanism,
        } => style(format!(
            "stepped back to {} ({mechanism})",
            format_unix(*target_unix)
        ))
        .green()
        .to_string(),
        RestoreOutcome::InSync { .. } => {
            style("already at original time").green().to_string()
        }
        RestoreOutcome::Failed {
            target_unix, error, ..
        } => style(format!(
            "FAILED: {error}; set the clock to {} manually",
            format_unix(*target_unix)
        ))
        .red()
        .bold()
        .to_string(),
    };
    out.push_str(&format!(
        "{} {}",
        style("Restore:").cyan().bold(),
        restore_val
    ));

    if verbose {
        out.push_str(&format!(
            "\n{orig_lbl} {orig_val} ({tz})",
            orig_lbl = style("Original Time:").cyan().bold(),
            orig_val = style(format_unix(r.original_unix)).green(),
            tz = format_tz_offset(r.tz_offset_secs),
        ));
        if let Some(sample) = r.sync.sample() {
            let ip_version = if sample.target.ip.is_ipv6() { "v6" } else { "v4" };
            out.push_str(&format!(
                "\n{ip_lbl} {ip_val} ({ver})\n{utc_lbl} {utc_val}\n{rtt_lbl} {rtt_val:.3} ms",
                ip_lbl = style("Authority IP:").cyan().bold(),
                ip_val = style(sample.target.ip).green(),
                ver = ip_version,
                utc_lbl = style("Authority Time:").cyan().bold(),
                utc_val = style(sample.utc().to_rfc2822()).green(),
                rtt_lbl = style("Round Trip Delay:").cyan().bold(),
                rtt_val = sample.rtt_ms,
            ));
        }
        out.push_str(&format!(
            "\n{cmd_lbl} {cmd_val}",
            cmd_lbl = style("Command Line:").cyan().bold(),
            cmd_val = style(&r.command_line).green(),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::QueryFailure;

    fn report() -> TransactionReport {
        TransactionReport {
            authority: "dc01".into(),
            command_line: "kinit user@CORP".into(),
            original_unix: 1_703_356_878.0,
            tz_offset_secs: 3_600,
            sync: SyncOutcome::QueryFailed {
                kind: QueryFailure::Timeout,
                error: "network: no reply from authority within 10s".into(),
            },
            command: CommandOutcome::Skipped {
                reason: "authority query failed".into(),
            },
            restore: RestoreOutcome::InSync {
                target_unix: 1_703_356_878.0,
            },
            interrupted: false,
        }
    }

    #[test]
    fn renders_every_stage_line() {
        console::set_colors_enabled(false);
        let text = render_report(&report(), false);
        assert!(text.contains("Authority: dc01"));
        assert!(text.contains("query failed"));
        assert!(text.contains("skipped"));
        assert!(text.contains("already at original time"));
    }

    #[test]
    fn verbose_adds_the_command_line() {
        console::set_colors_enabled(false);
        let text = render_report(&report(), true);
        assert!(text.contains("kinit user@CORP"));
        assert!(text.contains("Original Time: 2023-12-23 18:41:18.000 UTC (UTC+01:00)"));
    }

    #[test]
    fn tz_offsets_render_signed() {
        assert_eq!(format_tz_offset(0), "UTC+00:00");
        assert_eq!(format_tz_offset(5 * 3600 + 30 * 60), "UTC+05:30");
        assert_eq!(format_tz_offset(-8 * 3600), "UTC-08:00");
    }
}
