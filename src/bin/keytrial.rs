//! keytrial CLI - Command-line interface for the keytrial engine
//!
//! Commands:
//! - replay: Replay keytrial.script.v1 documents into trial snapshots
//! - align: Align a passage against typed text
//! - validate: Validate replay scripts
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use keytrial::alignment::AlignmentEngine;
use keytrial::config::EngineConfig;
use keytrial::schema::{ScriptAdapter, TrialScript, SCRIPT_VERSION};
use keytrial::snapshot::{SnapshotExporter, TrialSnapshot, SNAPSHOT_VERSION};
use keytrial::types::AlignmentResult;
use keytrial::{TrialError, ENGINE_VERSION};

/// keytrial - Keystroke capture and alignment for typing trials
#[derive(Parser)]
#[command(name = "keytrial")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Replay and analyze typing trials", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay scripts and emit one snapshot per finished trial
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Producer instance ID stamped on every snapshot
        #[arg(long)]
        instance_id: Option<String>,
    },

    /// Align a target passage against typed text
    Align {
        /// Target passage
        #[arg(long)]
        target: String,

        /// Typed text
        #[arg(long)]
        typed: String,

        /// Alignment granularity
        #[arg(long, default_value = "both")]
        granularity: GranularityArg,
    },

    /// Validate replay scripts
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// A single script document
    Json,
    /// Newline-delimited JSON (one script per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// JSON array of snapshots
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum GranularityArg {
    Character,
    Word,
    Both,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (keytrial.script.v1)
    Input,
    /// Output schema (keytrial.snapshot.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
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

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn run(command: Commands) -> Result<(), KeytrialCliError> {
    match command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            instance_id,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            instance_id,
        ),

        Commands::Align {
            target,
            typed,
            granularity,
        } => cmd_align(&target, &typed, granularity),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config_path: Option<&Path>,
    instance_id: Option<String>,
) -> Result<(), KeytrialCliError> {
    let config = match config_path {
        Some(path) => {
            let config = EngineConfig::from_json(&fs::read_to_string(path)?)?;
            log::debug!("Loaded engine configuration from {}", path.display());
            config
        }
        None => EngineConfig::default(),
    };

    let scripts = read_scripts(input, &input_format)?;
    if scripts.is_empty() {
        return Err(KeytrialCliError::NoScripts);
    }

    // One instance ID for the whole run
    let instance_id =
        instance_id.unwrap_or_else(|| SnapshotExporter::new().instance_id().to_string());

    let mut snapshots: Vec<TrialSnapshot> = Vec::new();
    for script in &scripts {
        let exporter = SnapshotExporter::with_instance_id(instance_id.clone());
        snapshots.extend(ScriptAdapter::run_with_exporter(script, &config, exporter)?);
    }
    log::info!(
        "Replayed {} script(s) into {} snapshot(s)",
        scripts.len(),
        snapshots.len()
    );

    let output_data = format_output(&snapshots, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_align(
    target: &str,
    typed: &str,
    granularity: GranularityArg,
) -> Result<(), KeytrialCliError> {
    let report = match granularity {
        GranularityArg::Character => AlignReport {
            character: Some(AlignmentEngine::align_characters(target, typed)),
            word: None,
        },
        GranularityArg::Word => AlignReport {
            character: None,
            word: Some(AlignmentEngine::align_words(target, typed)),
        },
        GranularityArg::Both => {
            let config = EngineConfig::default();
            let (character, word) =
                AlignmentEngine::align_both(target, typed, config.max_tokens_warning);
            AlignReport {
                character: Some(character),
                word: Some(word),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), KeytrialCliError> {
    let scripts = read_scripts(input, &input_format)?;

    let errors: Vec<ValidationErrorDetail> = scripts
        .iter()
        .enumerate()
        .flat_map(|(index, script)| {
            ScriptAdapter::validate(script)
                .into_iter()
                .map(move |e| ValidationErrorDetail {
                    index,
                    error: e.to_string(),
                })
        })
        .collect();

    let mut invalid: Vec<usize> = errors.iter().map(|e| e.index).collect();
    invalid.dedup();

    let report = ValidationReport {
        total_scripts: scripts.len(),
        valid_scripts: scripts.len() - invalid.len(),
        invalid_scripts: invalid.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total scripts:   {}", report.total_scripts);
        println!("Valid scripts:   {}", report.valid_scripts);
        println!("Invalid scripts: {}", report.invalid_scripts);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Script {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_scripts > 0 {
        Err(KeytrialCliError::ValidationFailed(report.invalid_scripts))
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), KeytrialCliError> {
    match schema_type {
        SchemaType::Input => {
            println!("Input Schema: {}", SCRIPT_VERSION);
            println!();
            println!("A script holds a passage, optional next_passages, a context and steps.");
            println!();
            println!("Step types:");
            println!("  - key_down {{ key, time_ms }}");
            println!("  - key_up {{ key, time_ms }}");
            println!("  - clear");
            println!("  - set_passage {{ passage }}");
            println!("  - set_context {{ context }}");
            println!("  - submit {{ time_ms }}");
            println!("  - reset_typing {{ time_ms }}");
            println!("  - reset_text_and_typing {{ time_ms }}");
            println!("  - rearm");
            println!();
            println!("Condition kinds: static, gradient, particles, waves");
        }
        SchemaType::Output => {
            println!("Output Schema: {}", SNAPSHOT_VERSION);
            println!();
            println!("- producer: {{ name, version, instance_id }}");
            println!("- event: submit | reset-typing | reset-text-and-typing");
            println!("- practice: true for reset variants");
            println!("- passage, target_text, typed_text, context");
            println!(
                "- events: [{{ key, press_time, release_time, hold_time, lag_time, total_lag_time }}]"
            );
            println!("- character_alignment / word_alignment: {{ granularity, ops, distance }}");
            println!(
                "- metrics: {{ per_key, accuracy, word_accuracy, chars_per_second, wpm, ... }}"
            );
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, KeytrialCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            log::warn!("Reading script from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_scripts(
    input: &Path,
    input_format: &InputFormat,
) -> Result<Vec<TrialScript>, KeytrialCliError> {
    let input_data = read_input(input)?;
    let scripts = match input_format {
        InputFormat::Json => vec![ScriptAdapter::parse(&input_data)?],
        InputFormat::Ndjson => ScriptAdapter::parse_ndjson(&input_data)?,
    };
    Ok(scripts)
}

fn format_output(
    snapshots: &[TrialSnapshot],
    format: &OutputFormat,
) -> Result<String, KeytrialCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for snapshot in snapshots {
                lines.push(serde_json::to_string(snapshot)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(snapshots)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshots)?),
    }
}

// Error types

#[derive(Debug)]
enum KeytrialCliError {
    Io(io::Error),
    Trial(TrialError),
    Json(serde_json::Error),
    NoScripts,
    ValidationFailed(usize),
}

impl From<io::Error> for KeytrialCliError {
    fn from(e: io::Error) -> Self {
        KeytrialCliError::Io(e)
    }
}

impl From<TrialError> for KeytrialCliError {
    fn from(e: TrialError) -> Self {
        KeytrialCliError::Trial(e)
    }
}

impl From<serde_json::Error> for KeytrialCliError {
    fn from(e: serde_json::Error) -> Self {
        KeytrialCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<KeytrialCliError> for CliError {
    fn from(e: KeytrialCliError) -> Self {
        match e {
            KeytrialCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            KeytrialCliError::Trial(e) => {
                let (code, hint) = match &e {
                    TrialError::InvalidConfig(_) => {
                        ("CONFIG_ERROR", "Check the engine configuration file")
                    }
                    TrialError::InvalidScript(_) => {
                        ("VALIDATION_ERROR", "Run 'keytrial validate' for details")
                    }
                    _ => ("PARSE_ERROR", "Ensure input matches keytrial.script.v1 schema"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            KeytrialCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            KeytrialCliError::NoScripts => CliError {
                code: "NO_SCRIPTS".to_string(),
                message: "No scripts found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            KeytrialCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} scripts failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct AlignReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    character: Option<AlignmentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    word: Option<AlignmentResult>,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_scripts: usize,
    valid_scripts: usize,
    invalid_scripts: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}
