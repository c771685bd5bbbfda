//! Codefix CLI
//!
//! Entry point for the `codefix` command-line tool.

use clap::{Parser, Subcommand};
use codefix::config::{user_config_path, PROJECT_CONFIG_FILE};
use codefix::error::EXIT_CODE_USAGE;
use codefix::host::HttpTransport;
use codefix::signal::SignalHandler;
use codefix::telemetry::{JsonLinesTelemetry, TelemetrySink, TracingTelemetry};
use codefix::{CancelToken, EffectiveConfig, FixPipeline, FixRequest, RunSummary};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "codefix")]
#[command(about = "Generate a code fix for a file range on a remote service", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fix for one issue
    Run {
        /// Source file containing the issue
        #[arg(long, required_unless_present = "request")]
        file: Option<PathBuf>,

        /// First line of the issue (0-based)
        #[arg(long, required_unless_present = "request")]
        start_line: Option<u32>,

        /// Last line of the issue
        #[arg(long, required_unless_present = "request")]
        end_line: Option<u32>,

        /// Rule that produced the issue
        #[arg(long, required_unless_present = "request")]
        rule_id: Option<String>,

        /// Detector that produced the issue
        #[arg(long, required_unless_present = "request")]
        detector_id: Option<String>,

        /// Name of the fix being requested
        #[arg(long, required_unless_present = "request")]
        fix_name: Option<String>,

        /// Source language
        #[arg(long, required_unless_present = "request")]
        language: Option<String>,

        /// Recommendation text sent with the job
        #[arg(long, required_unless_present = "request")]
        recommendation: Option<String>,

        /// Load the whole request from a JSON file
        #[arg(long, conflicts_with_all = ["file", "start_line", "end_line"])]
        request: Option<PathBuf>,

        /// Project config file (default: .codefix.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Service endpoint, overriding configuration
        #[arg(long)]
        endpoint: Option<String>,

        /// Print a JSON run summary instead of the diff
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Project config file (default: .codefix.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("codefix=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codefix=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let code = match cli.command {
        Commands::Run {
            file,
            start_line,
            end_line,
            rule_id,
            detector_id,
            fix_name,
            language,
            recommendation,
            request,
            config,
            endpoint,
            json,
        } => {
            let request = match request {
                Some(path) => load_request(&path),
                None => Ok(FixRequest {
                    file: file.unwrap_or_default(),
                    start_line: start_line.unwrap_or_default(),
                    end_line: end_line.unwrap_or_default(),
                    recommendation: recommendation.unwrap_or_default(),
                    rule_id: rule_id.unwrap_or_default(),
                    detector_id: detector_id.unwrap_or_default(),
                    fix_name: fix_name.unwrap_or_default(),
                    language: language.unwrap_or_default(),
                }),
            };
            match request {
                Ok(request) => run_fix(request, config, endpoint, json).await,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    EXIT_CODE_USAGE
                }
            }
        }
        Commands::Config { config, json } => run_config(config, json),
    };

    process::exit(code);
}

fn load_request(path: &Path) -> Result<FixRequest, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("reading {}: {}", path.display(), e))?;
    serde_json::from_str(&contents).map_err(|e| format!("parsing {}: {}", path.display(), e))
}

fn load_config(
    project_path: Option<PathBuf>,
    endpoint: Option<String>,
) -> Result<EffectiveConfig, String> {
    let project = project_path.unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let overrides = endpoint.map(|e| serde_json::json!({ "service": { "endpoint": e } }));

    EffectiveConfig::build(user_config_path().as_deref(), Some(&project), overrides)
        .map_err(|e| e.to_string())
}

async fn run_fix(
    request: FixRequest,
    config_path: Option<PathBuf>,
    endpoint: Option<String>,
    json_output: bool,
) -> i32 {
    if let Err(e) = request.validate() {
        eprintln!("Invalid request: {}", e);
        return EXIT_CODE_USAGE;
    }

    let effective = match load_config(config_path, endpoint) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return EXIT_CODE_USAGE;
        }
    };
    let settings = effective.settings();

    let transport = match settings
        .http_config()
        .map_err(|e| e.to_string())
        .and_then(|c| HttpTransport::new(c).map_err(|e| e.to_string()))
    {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return EXIT_CODE_USAGE;
        }
    };
    debug!(endpoint = transport.endpoint(), "using HTTP transport");

    let telemetry: Arc<dyn TelemetrySink> = match settings.telemetry.events_path {
        Some(ref path) => Arc::new(JsonLinesTelemetry::new(path.clone())),
        None => Arc::new(TracingTelemetry),
    };

    let token = CancelToken::new();
    if let Err(e) = SignalHandler::new(token.clone()).install() {
        error!(error = %e, "failed to install interrupt handler");
    }

    let pipeline = FixPipeline::from_config(settings, Arc::new(transport)).with_telemetry(telemetry);
    let report = pipeline.execute(&request, &token).await;
    let summary = RunSummary::from_report(&report);

    if json_output {
        match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing output: {}", e),
        }
    } else {
        match report.result {
            Ok(ref outcome) => {
                if let Some(ref description) = outcome.suggested_fix.description {
                    eprintln!("{}", description);
                }
                print!("{}", outcome.suggested_fix.code_diff);
                if !outcome.suggested_fix.references.is_empty() {
                    eprintln!(
                        "Fix derived from {} licensed reference(s)",
                        outcome.suggested_fix.references.len()
                    );
                }
            }
            Err(ref failure) => eprintln!("Error: {}", failure),
        }
    }

    summary.exit_code
}

fn run_config(config_path: Option<PathBuf>, json_output: bool) -> i32 {
    let effective = match load_config(config_path, None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return EXIT_CODE_USAGE;
        }
    };

    if json_output {
        match effective.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return 1;
            }
        }
        return 0;
    }

    println!("Sources:");
    for source in &effective.sources {
        match source.path {
            Some(ref path) => println!("  {:?}: {}", source.origin, path),
            None => println!("  {:?}", source.origin),
        }
    }
    if !effective.redactions.is_empty() {
        println!("Redacted: {}", effective.redactions.join(", "));
    }
    println!();
    match serde_json::to_string_pretty(&effective.config) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            return 1;
        }
    }
    0
}
