use clap::{Parser, ValueEnum};
use console::{Term, set_colors_enabled, style};
use std::io::{self, IsTerminal};
use std::process;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use skewrun::{
    ApplyFailure, ClockControl, CommandOutcome, QueryFailure, ShellRunner, SntpAuthority,
    SyncOutcome, SystemClock, TransactionOpts, TransactionReport, fmt, run_transaction,
};

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "skewrun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sync the clock to a time authority, run a command, restore the clock")]
#[command(long_about = Some(
    "Temporarily step the system clock to an authoritative time source, run a\n\
     command under the corrected clock, and restore the original clock\n\
     afterwards, whatever happened in between.\n\
     \n\
     Examples:\n\
       sudo skewrun dc01.corp.example 'kinit user@CORP.EXAMPLE'\n\
       sudo skewrun 10.0.0.1 'ldapsearch -H ldap://dc.corp.example'\n\
       skewrun --dry-run 0.pool.ntp.org date"
))]
struct Args {
    /// Time authority host or IP, optionally with ":port"
    #[arg(index = 1)]
    authority: String,

    /// Command line to run under the corrected clock
    #[arg(
        index = 2,
        num_args = 1..,
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,

    /// Show detailed output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Output format: text or json
    #[arg(short = 'f', long, default_value = "text", value_enum)]
    format: OutputFormat,

    /// Alias for JSON output
    #[arg(short = 'j', long)]
    json: bool,

    /// Pretty-print JSON
    #[arg(short = 'p', long)]
    pretty: bool,

    /// Disable colored output
    #[arg(long = "no-color", alias = "nocolor")]
    no_color: bool,

    /// Use IPv6 resolution only
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Authority query timeout in seconds
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// Run the command even if synchronization fails
    #[arg(long)]
    force: bool,

    /// Rehearse the whole transaction without privileges or clock writes
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() {
    let mut args = Args::parse();

    // alias --json
    if args.json {
        args.format = OutputFormat::Json;
    }

    let default_filter = if args.verbose {
        "skewrun=debug"
    } else {
        "skewrun=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    // colors
    let want_color = matches!(args.format, OutputFormat::Text)
        && io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none()
        && !args.no_color;
    set_colors_enabled(want_color);

    let term = Term::stdout();

    // Refuse before any network or clock action when the clock cannot be
    // written back afterwards.
    let mut clock = SystemClock::new(args.dry_run);
    if !clock.privileged() {
        term.write_line(
            &style("Error: need root or CAP_SYS_TIME to step the clock (try --dry-run to rehearse)")
                .red()
                .bold()
                .to_string(),
        )
        .ok();
        process::exit(12);
    }

    let command_line = args.command.join(" ");
    let authority = SntpAuthority::new(args.authority.clone(), args.ipv6);
    let runner = ShellRunner;
    let opts = TransactionOpts {
        timeout: Duration::from_secs_f64(args.timeout),
        force: args.force,
        ..TransactionOpts::default()
    };

    let report = run_transaction(
        &authority,
        &mut clock,
        &runner,
        &command_line,
        &opts,
        async {
            let _ = signal::ctrl_c().await;
        },
    )
    .await;

    match args.format {
        OutputFormat::Text => {
            term.write_line(&fmt::text::render_report(&report, args.verbose))
                .ok();
        }
        OutputFormat::Json => match fmt::json::to_json(&report, args.pretty) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("error serializing: {e}"),
        },
    }

    process::exit(exit_code(&report));
}

fn query_code(kind: QueryFailure) -> i32 {
    match kind {
        QueryFailure::Resolve => 2,
        QueryFailure::Timeout => 3,
        QueryFailure::Malformed => 4,
        QueryFailure::Network => 5,
    }
}

fn apply_code(kind: ApplyFailure) -> i32 {
    match kind {
        ApplyFailure::Permission => 12,
        ApplyFailure::Exhausted => 14,
        ApplyFailure::Unsupported => 15,
    }
}

/// The command's verdict wins whenever the command ran; otherwise the
/// reason it was skipped decides.
fn exit_code(report: &TransactionReport) -> i32 {
    match &report.command {
        CommandOutcome::Succeeded => 0,
        CommandOutcome::Failed | CommandOutcome::SpawnFailed { .. } => 1,
        CommandOutcome::Interrupted => 130,
        CommandOutcome::Skipped { .. } => match &report.sync {
            SyncOutcome::QueryFailed { kind, .. } => query_code(*kind),
            SyncOutcome::ApplyFailed { kind, .. } => apply_code(*kind),
            SyncOutcome::Interrupted => 130,
            _ => 1,
        },
    }
}
