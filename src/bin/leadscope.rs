//! Leadscope CLI - Command-line interface for Leadscope
//!
//! Commands:
//! - replay: Feed an NDJSON interaction log through the engines
//! - report: Print the analytics report, insights or a session journey from stored state
//! - predict: Predict next actions from stored patterns
//! - doctor: Diagnose stored state and configuration
//! - reset: Clear stored state

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use leadscope::attribution::AttributionSnapshot;
use leadscope::behavior::{BehaviorSnapshot, RecommendationKind};
use leadscope::storage::{FileStore, KeyValueStore, SnapshotSlot};
use leadscope::{
    IntelConfig, IntelError, Intelligence, NdjsonSource, TracingSink, LEADSCOPE_VERSION,
    PRODUCER_NAME,
};

/// Leadscope - On-device behavioral intelligence for real-estate lead generation
#[derive(Parser)]
#[command(name = "leadscope")]
#[command(version = LEADSCOPE_VERSION)]
#[command(about = "Learn visitor behavior and attribute conversions", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (JSON, partial allowed)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an NDJSON interaction log and print the analytics report
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Persist state to this directory (memory-only if omitted)
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Mirror every attribution event to the log (shown with --verbose)
        #[arg(long)]
        trace_events: bool,
    },

    /// Print reports from stored state
    Report {
        /// State directory
        #[arg(long)]
        state_dir: PathBuf,

        /// Print the journey of this session instead of the analytics report
        #[arg(long, conflicts_with = "insights")]
        journey: Option<String>,

        /// Print user insights instead of the analytics report
        #[arg(long)]
        insights: bool,

        /// Only recommendations of this kind (with --insights)
        #[arg(long, requires = "insights")]
        kind: Option<KindArg>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Predict next actions from stored patterns
    Predict {
        /// State directory
        #[arg(long)]
        state_dir: PathBuf,

        /// Current page
        #[arg(long)]
        page: String,

        /// Action just performed
        #[arg(long)]
        action: String,
    },

    /// Diagnose stored state and configuration
    Doctor {
        /// State directory to check
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clear stored state and start a new session
    Reset {
        /// State directory
        #[arg(long)]
        state_dir: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Content,
    Feature,
    Navigation,
    Timing,
}

impl From<KindArg> for RecommendationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Content => RecommendationKind::Content,
            KindArg::Feature => RecommendationKind::Feature,
            KindArg::Navigation => RecommendationKind::Navigation,
            KindArg::Timing => RecommendationKind::Timing,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LeadscopeCliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            input,
            state_dir,
            output_format,
            trace_events,
        } => cmd_replay(
            &input,
            state_dir.as_deref(),
            config,
            output_format,
            trace_events,
        ),

        Commands::Report {
            state_dir,
            journey,
            insights,
            kind,
            output_format,
        } => cmd_report(&state_dir, config, journey, insights, kind, output_format),

        Commands::Predict {
            state_dir,
            page,
            action,
        } => cmd_predict(&state_dir, config, &page, &action),

        Commands::Doctor { state_dir, json } => cmd_doctor(state_dir.as_deref(), config, json),

        Commands::Reset { state_dir } => cmd_reset(&state_dir, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<IntelConfig, LeadscopeCliError> {
    match path {
        Some(path) => Ok(IntelConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(IntelConfig::default()),
    }
}

/// Open a service on `state_dir`, or memory-only without one
fn open_service(
    state_dir: Option<&Path>,
    config: IntelConfig,
) -> Result<Intelligence, LeadscopeCliError> {
    match state_dir {
        Some(dir) => {
            let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir)?);
            Ok(Intelligence::with_storage(config, store)?)
        }
        None => Ok(Intelligence::new(config)?),
    }
}

/// Open a service on an existing state directory
fn open_existing(state_dir: &Path, config: IntelConfig) -> Result<Intelligence, LeadscopeCliError> {
    if !state_dir.is_dir() {
        return Err(LeadscopeCliError::MissingState(state_dir.to_path_buf()));
    }
    open_service(Some(state_dir), config)
}

fn cmd_replay(
    input: &Path,
    state_dir: Option<&Path>,
    config: IntelConfig,
    output_format: OutputFormat,
    trace_events: bool,
) -> Result<(), LeadscopeCliError> {
    let max_fields = config.max_extension_fields;
    let mut intel = open_service(state_dir, config)?;
    if trace_events {
        intel.set_sink(Box::new(TracingSink));
    }

    let (applied, skipped) = if input.to_string_lossy() == "-" {
        let mut source = NdjsonSource::new(io::stdin().lock()).with_max_extension_fields(max_fields);
        (intel.consume(&mut source), source.skipped())
    } else {
        let file = fs::File::open(input)?;
        let mut source = NdjsonSource::new(BufReader::new(file)).with_max_extension_fields(max_fields);
        (intel.consume(&mut source), source.skipped())
    };

    if skipped > 0 {
        warn!(skipped, "malformed interactions skipped");
    }
    if applied == 0 {
        return Err(LeadscopeCliError::NoInteractions);
    }
    info!(applied, session_id = intel.session_id(), "replay complete");

    let diagnostics = intel.diagnostics();
    if diagnostics.storage_failures > 0 {
        warn!(
            failures = diagnostics.storage_failures,
            last_error = ?diagnostics.last_storage_error,
            "state was not fully persisted"
        );
    }

    print_json(&intel.analytics_report(), &output_format)
}

fn cmd_report(
    state_dir: &Path,
    config: IntelConfig,
    journey: Option<String>,
    insights: bool,
    kind: Option<KindArg>,
    output_format: OutputFormat,
) -> Result<(), LeadscopeCliError> {
    let intel = open_existing(state_dir, config)?;

    if let Some(session_id) = journey {
        return print_json(&intel.user_journey(&session_id), &output_format);
    }
    if insights {
        let mut insights = intel.user_insights();
        if let Some(kind) = kind {
            insights.recommendations = intel.personalized_recommendations(Some(kind.into()));
        }
        return print_json(&insights, &output_format);
    }
    print_json(&intel.analytics_report(), &output_format)
}

fn cmd_predict(
    state_dir: &Path,
    config: IntelConfig,
    page: &str,
    action: &str,
) -> Result<(), LeadscopeCliError> {
    let intel = open_existing(state_dir, config)?;
    println!("{}", serde_json::to_string(&intel.predict_user_behavior(page, action))?);
    Ok(())
}

fn cmd_reset(state_dir: &Path, config: IntelConfig) -> Result<(), LeadscopeCliError> {
    let mut intel = open_existing(state_dir, config)?;
    let failures_before = intel.diagnostics().storage_failures;
    intel.reset();
    let diagnostics = intel.diagnostics();
    if diagnostics.storage_failures > failures_before {
        let message = diagnostics.last_storage_error.unwrap_or_default();
        return Err(LeadscopeCliError::Intel(IntelError::Storage(message)));
    }
    println!("State cleared; new session {}", intel.session_id());
    Ok(())
}

/// Check one stored snapshot
fn check_snapshot<T, F>(store: &Arc<dyn KeyValueStore>, key: String, summarize: F) -> DoctorCheck
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(&T) -> String,
{
    let slot = SnapshotSlot::new(store.clone(), key.clone());
    match slot.load::<T>() {
        Ok(Some(snapshot)) => DoctorCheck {
            name: key,
            status: CheckStatus::Ok,
            message: summarize(&snapshot),
        },
        Ok(None) => DoctorCheck {
            name: key,
            status: CheckStatus::Warning,
            message: "No snapshot stored yet".to_string(),
        },
        Err(e) => DoctorCheck {
            name: key,
            status: CheckStatus::Error,
            message: format!("Unreadable snapshot (will be discarded on next start): {}", e),
        },
    }
}

fn cmd_doctor(
    state_dir: Option<&Path>,
    config: IntelConfig,
    json: bool,
) -> Result<(), LeadscopeCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "leadscope_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Leadscope version {}", LEADSCOPE_VERSION),
    });

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "namespace '{}', {} behaviors / {} events in memory",
                config.storage_namespace, config.max_behaviors, config.max_events
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    if let Some(dir) = state_dir {
        if dir.is_dir() {
            match FileStore::open(dir) {
                Ok(store) => {
                    checks.push(DoctorCheck {
                        name: "state_dir".to_string(),
                        status: CheckStatus::Ok,
                        message: format!("Snapshots stored in {}", store.dir().display()),
                    });
                    let store: Arc<dyn KeyValueStore> = Arc::new(store);
                    checks.push(check_snapshot::<BehaviorSnapshot, _>(
                        &store,
                        config.behavior_key(),
                        |s| {
                            format!(
                                "{} behaviors, {} patterns, updated {}",
                                s.behaviors.len(),
                                s.patterns.len(),
                                s.last_updated.to_rfc3339()
                            )
                        },
                    ));
                    checks.push(check_snapshot::<AttributionSnapshot, _>(
                        &store,
                        config.attribution_key(),
                        |s| {
                            format!(
                                "{} events, session {}, updated {}",
                                s.events.len(),
                                s.session_id,
                                s.last_updated.to_rfc3339()
                            )
                        },
                    ));
                }
                Err(e) => checks.push(DoctorCheck {
                    name: "state_dir".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot open state directory: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "state_dir".to_string(),
                status: CheckStatus::Warning,
                message: "State directory does not exist".to_string(),
            });
        }
    }

    // Check stdin is available (for `replay -i -`)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay from stdin ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: LEADSCOPE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Leadscope Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(LeadscopeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn print_json<T: Serialize>(value: &T, format: &OutputFormat) -> Result<(), LeadscopeCliError> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    println!("{}", output);
    Ok(())
}

// Error types

#[derive(Debug)]
enum LeadscopeCliError {
    Io(io::Error),
    Intel(IntelError),
    Json(serde_json::Error),
    MissingState(PathBuf),
    NoInteractions,
    DoctorFailed,
}

impl From<io::Error> for LeadscopeCliError {
    fn from(e: io::Error) -> Self {
        LeadscopeCliError::Io(e)
    }
}

impl From<IntelError> for LeadscopeCliError {
    fn from(e: IntelError) -> Self {
        LeadscopeCliError::Intel(e)
    }
}

impl From<serde_json::Error> for LeadscopeCliError {
    fn from(e: serde_json::Error) -> Self {
        LeadscopeCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<LeadscopeCliError> for CliError {
    fn from(e: LeadscopeCliError) -> Self {
        match e {
            LeadscopeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LeadscopeCliError::Intel(IntelError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Capacities must be positive and the namespace non-empty".to_string()),
            },
            LeadscopeCliError::Intel(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'leadscope doctor --state-dir <DIR>' for details".to_string()),
            },
            LeadscopeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LeadscopeCliError::MissingState(dir) => CliError {
                code: "NO_STATE".to_string(),
                message: format!("State directory {} does not exist", dir.display()),
                hint: Some("Run 'leadscope replay --state-dir <DIR>' first".to_string()),
            },
            LeadscopeCliError::NoInteractions => CliError {
                code: "NO_INTERACTIONS".to_string(),
                message: "No interactions found in input".to_string(),
                hint: Some("Ensure input is NDJSON with a \"kind\" field on each line".to_string()),
            },
            LeadscopeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
