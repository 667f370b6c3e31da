//! voiceguard - voice authenticity API server, scenario harness and analysis tool.

mod analyze;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use voiceguard::runner::{print_summary, save_report};
use voiceguard::{
    Classifier, GeminiClassifier, ScenarioRunner, ServiceConfig, StaticClassifier,
    VoiceDetectionHandler, default_scenarios,
};

const DEFAULT_SERVE_PACING: Duration = Duration::from_millis(500);

/// Voice authenticity detection API.
///
/// Classifies MP3 speech samples in Tamil, English, Hindi, Malayalam or
/// Telugu as HUMAN or AI_GENERATED using Gemini forensic analysis.
#[derive(Parser, Debug)]
#[command(name = "voiceguard")]
#[command(about = "Voice authenticity detection API and test harness")]
#[command(version)]
struct Cli {
    /// Config file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scenario suite against the in-process pipeline
    Test(TestArgs),
    /// Serve the API and the live test suite over HTTP
    Serve(ServeArgs),
    /// Analyze an audio file and print the request/response log
    Analyze(analyze::AnalyzeArgs),
}

#[derive(Args, Debug)]
struct TestArgs {
    /// Use the deterministic classifier instead of Gemini
    #[arg(long)]
    stub: bool,

    /// Delay before each scenario in milliseconds (overrides config)
    #[arg(long)]
    pace_ms: Option<u64>,

    /// Output JSON report to file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Quiet mode (no summary table)
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address (e.g. :8080 or 127.0.0.1:8080)
    #[arg(long, default_value = ":8080")]
    addr: String,

    /// Use the deterministic classifier instead of Gemini
    #[arg(long)]
    stub: bool,

    /// Delay before each scenario in milliseconds (overrides config, default 500)
    #[arg(long)]
    pace_ms: Option<u64>,

    /// Path to static files directory for the web UI
    #[arg(long)]
    serve_static: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ServiceConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Test(args) => run_tests(&config, args).await,
        Commands::Serve(args) => serve(&config, args).await,
        Commands::Analyze(args) => analyze::run(&config, args).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Pick the classification backend.
pub(crate) fn build_classifier(config: &ServiceConfig, stub: bool) -> Result<Arc<dyn Classifier>> {
    if stub {
        info!("using static classifier");
        return Ok(Arc::new(StaticClassifier::default()));
    }
    let gemini = GeminiClassifier::new(config.gemini.clone())
        .context("cannot create Gemini classifier (set GEMINI_API_KEY or pass --stub)")?;
    info!(model = %config.gemini.model, "using Gemini classifier");
    Ok(Arc::new(gemini))
}

async fn run_tests(config: &ServiceConfig, args: TestArgs) -> Result<()> {
    let classifier = build_classifier(config, args.stub)?;
    let handler = VoiceDetectionHandler::new(config, classifier);

    let mut runner = ScenarioRunner::new(handler, default_scenarios(&config.api_key))
        .with_settings(&config.runner);
    if let Some(ms) = args.pace_ms {
        runner = runner.with_pacing(Duration::from_millis(ms));
    }

    if !args.quiet {
        println!(
            "=== Running {} scenarios against {} ===",
            runner.scenarios().len(),
            runner.endpoint()
        );
    }

    let report = runner.run_all().await?;

    if !args.quiet {
        print_summary(runner.scenarios(), &report);
    }

    if let Some(output) = &args.output {
        save_report(&report, output)?;
        println!("\nReport saved to {}", output.display());
    }

    if !report.all_passed() {
        anyhow::bail!("{} of {} scenarios failed", report.stats.failed, report.stats.total);
    }
    Ok(())
}

/// Pacing for the served suite: flag, then config, then a visible default.
fn serve_pacing(config: &ServiceConfig, flag_ms: Option<u64>) -> Duration {
    match flag_ms {
        Some(ms) => Duration::from_millis(ms),
        None => config.runner.pacing_or(DEFAULT_SERVE_PACING),
    }
}

async fn serve(config: &ServiceConfig, args: ServeArgs) -> Result<()> {
    let classifier = build_classifier(config, args.stub)?;
    let handler = VoiceDetectionHandler::new(config, classifier);

    let runner = ScenarioRunner::new(handler.clone(), default_scenarios(&config.api_key))
        .with_settings(&config.runner)
        .with_pacing(serve_pacing(config, args.pace_ms));

    let state = server::AppState::new(handler, runner);
    server::start_server(&args.addr, state, args.serve_static).await
}
