//! fesk - Command-line interface for FESK sleep frames
//!
//! Commands:
//! - decode: Decode and score frames
//! - export: Render frames as CSV or JSON
//! - store: Decode frames and append them to a store file
//! - validate: Check frames without scoring them
//! - doctor: Diagnose configuration and store health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use fesk_sleep::export::{self, ExportFormat};
use fesk_sleep::frame::{self, FRAME_HEX_LEN};
use fesk_sleep::pipeline::{decode_and_score, FrameProcessor};
use fesk_sleep::types::ScoredFrame;
use fesk_sleep::{FeskError, OnsetClock, ScoringConfig, SleepStore, FESK_VERSION};

/// fesk - Decode and score sleep telemetry frames
#[derive(Parser)]
#[command(name = "fesk")]
#[command(version = FESK_VERSION)]
#[command(about = "Decode FESK sleep frames into nightly and circadian scores", long_about = None)]
struct Cli {
    /// Scoring config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Clock for hour-of-day and export times: utc, local or an offset like +02:00
    #[arg(long, global = true)]
    clock: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode and score frames (one per line, or wrapped across lines)
    Decode {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        format: OutputFormat,
    },

    /// Render a frame as CSV or JSON
    Export {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout) [default: sleep-data-<date>.<ext>]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format
        #[arg(long, default_value = "csv")]
        format: ExportKind,
    },

    /// Decode frames and append them to a store file
    Store {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Store file (created if missing)
        #[arg(long)]
        store: PathBuf,
    },

    /// Check frames without scoring them
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and store health
    Doctor {
        /// Check a store file
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one scored frame per line)
    Ndjson,
    /// JSON array of scored frames
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Csv,
    Json,
}

impl From<ExportKind> for ExportFormat {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::Csv => ExportFormat::Csv,
            ExportKind::Json => ExportFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FeskCliError> {
    let config_path = cli.config.as_deref();
    let clock = cli.clock.as_deref();

    match cli.command {
        Commands::Decode { input, format } => {
            let config = resolve_config(config_path, clock)?;
            cmd_decode(&input, format, &config)
        }

        Commands::Export {
            input,
            output,
            format,
        } => {
            let config = resolve_config(config_path, clock)?;
            cmd_export(&input, output.as_deref(), format.into(), &config)
        }

        Commands::Store { input, store } => {
            let config = resolve_config(config_path, clock)?;
            cmd_store(&input, &store, config)
        }

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { store, json } => cmd_doctor(config_path, clock, store.as_deref(), json),
    }
}

/// Config file first, then the --clock flag on top
fn resolve_config(
    config_path: Option<&Path>,
    clock: Option<&str>,
) -> Result<ScoringConfig, FeskCliError> {
    let mut config = match config_path {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };
    if let Some(clock) = clock {
        config.clock = clock.parse::<OnsetClock>()?;
    }
    config.validate()?;
    tracing::debug!(clock = %config.clock, "resolved scoring config");
    Ok(config)
}

fn cmd_decode(
    input: &Path,
    format: OutputFormat,
    config: &ScoringConfig,
) -> Result<(), FeskCliError> {
    let frames = read_frames(input)?;
    if frames.is_empty() {
        return Err(FeskCliError::NoFrames);
    }

    let scored = frames
        .iter()
        .map(|raw| decode_and_score(raw, config))
        .collect::<Result<Vec<_>, _>>()?;

    print!("{}", format_output(&scored, &format)?);
    Ok(())
}

fn cmd_export(
    input: &Path,
    output: Option<&Path>,
    format: ExportFormat,
    config: &ScoringConfig,
) -> Result<(), FeskCliError> {
    let frames = read_frames(input)?;
    let raw = match frames.as_slice() {
        [] => return Err(FeskCliError::NoFrames),
        [raw] => raw,
        _ => return Err(FeskCliError::TooManyFrames(frames.len())),
    };

    let scored = decode_and_score(raw, config)?;
    let exported_at = chrono::Utc::now();
    let rendered = export::render(&scored, format, config.clock, exported_at)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format.file_name(exported_at.date_naive())));

    if output.to_string_lossy() == "-" {
        print!("{}", rendered);
    } else {
        fs::write(&output, rendered)?;
        tracing::info!(path = %output.display(), mime = format.mime_type(), "export written");
    }
    Ok(())
}

fn cmd_store(input: &Path, store: &Path, config: ScoringConfig) -> Result<(), FeskCliError> {
    let frames = read_frames(input)?;
    if frames.is_empty() {
        return Err(FeskCliError::NoFrames);
    }

    let mut processor = FrameProcessor::with_config(config);
    processor.load_store_file(store)?;

    // one millisecond apart so frames read together get distinct keys
    let mut captured_at = chrono::Utc::now();
    for raw in &frames {
        let record = processor.process_at(raw, captured_at)?;
        println!(
            "{}",
            serde_json::to_string(&StoreSummary {
                id: record.id.to_string(),
                timestamp: record.timestamp,
                cs: record.circadian_score.cs,
            })?
        );
        captured_at += chrono::Duration::milliseconds(1);
    }

    processor.save_store_file(store)?;
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), FeskCliError> {
    let frames = read_frames(input)?;

    let errors: Vec<ValidationErrorDetail> = frames
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            frame::decode(raw).err().map(|e| ValidationErrorDetail {
                index,
                error: e.to_string(),
            })
        })
        .collect();

    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - errors.len(),
        invalid_frames: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Frame {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(FeskCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config_path: Option<&Path>,
    clock: Option<&str>,
    store: Option<&Path>,
    json: bool,
) -> Result<(), FeskCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "fesk_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("fesk version {}", FESK_VERSION),
    });

    checks.push(DoctorCheck {
        name: "frame_format".to_string(),
        status: CheckStatus::Ok,
        message: format!("Expecting {} hex digits per frame", FRAME_HEX_LEN),
    });

    match resolve_config(config_path, clock) {
        Ok(config) => {
            let status = if config.clock == OnsetClock::Local {
                CheckStatus::Warning
            } else {
                CheckStatus::Ok
            };
            checks.push(DoctorCheck {
                name: "clock".to_string(),
                status,
                message: format!("Onset clock: {}", config.clock),
            });
        }
        Err(e) => checks.push(DoctorCheck {
            name: "clock".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        }),
    }

    if let Some(store_path) = store {
        if store_path.exists() {
            match SleepStore::load(store_path) {
                Ok(store) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Store file valid ({} records)", store.len()),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid store file: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Store file does not exist".to_string(),
            });
        }
    }

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
            message: "stdin is a pipe (frames can be piped in)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: FESK_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("fesk Doctor Report");
        println!("==================");
        println!("Version: {}", report.version);
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FeskCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

/// Read frames from a file or stdin; see [`frame::split_frames`]
fn read_frames(input: &Path) -> Result<Vec<String>, FeskCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    Ok(frame::split_frames(&input_data))
}

fn format_output(frames: &[ScoredFrame], format: &OutputFormat) -> Result<String, FeskCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for frame in frames {
                lines.push(serde_json::to_string(frame)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(frames)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(frames)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum FeskCliError {
    Io(io::Error),
    Fesk(FeskError),
    Json(serde_json::Error),
    NoFrames,
    TooManyFrames(usize),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for FeskCliError {
    fn from(e: io::Error) -> Self {
        FeskCliError::Io(e)
    }
}

impl From<FeskError> for FeskCliError {
    fn from(e: FeskError) -> Self {
        FeskCliError::Fesk(e)
    }
}

impl From<serde_json::Error> for FeskCliError {
    fn from(e: serde_json::Error) -> Self {
        FeskCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FeskCliError> for CliError {
    fn from(e: FeskCliError) -> Self {
        match e {
            FeskCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FeskCliError::Fesk(e @ FeskError::MalformedFrame { .. }) => CliError {
                code: "FRAME_REJECTED".to_string(),
                message: e.to_string(),
                hint: Some("Request retransmission from the watch".to_string()),
            },
            FeskCliError::Fesk(e @ (FeskError::InvalidClock(_) | FeskError::InvalidConfig(_))) => {
                CliError {
                    code: "CONFIG_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some("Use utc, local or an offset such as +02:00".to_string()),
                }
            }
            FeskCliError::Fesk(e) => CliError {
                code: "FESK_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            FeskCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FeskCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FeskCliError::TooManyFrames(count) => CliError {
                code: "TOO_MANY_FRAMES".to_string(),
                message: format!("Export takes one frame, found {}", count),
                hint: Some("Split the input into one frame per file".to_string()),
            },
            FeskCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Request retransmission of the rejected frames".to_string()),
            },
            FeskCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct StoreSummary {
    id: String,
    timestamp: i64,
    cs: u8,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
