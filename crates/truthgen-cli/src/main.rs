//! TruthGen command-line interface.
//!
//! Runs the analysis pipeline in-process and maintains the local result cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tokio::sync::mpsc;

use truthgen_lib::core::analysis::{
    AnalysisOracle, AnalysisOutcome, ChannelProgress, ChatCompletionsOracle, FileRef, Modality,
    ProgressUpdate, Submission, UnconfiguredOracle,
};
use truthgen_lib::core::settings::{default_config_dir, AppSettings, SettingsManager};
use truthgen_lib::core::CoreError;
use truthgen_lib::{open_local_store, AppState};

#[derive(Debug, Parser)]
#[command(name = "truthgen-cli", version, about = "Headless content credibility analysis")]
struct Cli {
    /// Settings directory (defaults to the platform config dir)
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a text, URL or media file
    Analyze(AnalyzeArgs),
    /// Maintain the local result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Inspect or create the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("input").required(true).multiple(false)))]
struct AnalyzeArgs {
    /// Text to check
    #[arg(long, group = "input")]
    text: Option<String>,
    /// URL to check
    #[arg(long, group = "input")]
    url: Option<String>,
    /// Image, video or audio file to check
    #[arg(long, group = "input", value_name = "PATH")]
    file: Option<PathBuf>,
    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// Remove entries older than the configured TTL
    Evict,
    /// Show entry count and age range
    Stats,
    /// Remove every local entry
    Clear,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print effective settings (API keys masked)
    Show,
    /// Write default settings if none exist
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let manager = SettingsManager::new(cli.config_dir.unwrap_or_else(default_config_dir));
    tracing::debug!("Using settings at {}", manager.settings_path().display());

    match cli.command {
        Command::Analyze(args) => analyze(&manager.load_with_env(), args).await,
        Command::Cache { action } => cache(&manager.load_with_env(), action),
        Command::Config { action } => config(&manager, action),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// analyze
// ---------------------------------------------------------------------------

async fn analyze(settings: &AppSettings, args: AnalyzeArgs) -> Result<()> {
    let submission = build_submission(&args)?;
    let state = AppState::with_oracle(settings, build_oracle(settings)?)
        .context("failed to open result caches")?;
    if let Err(e) = state.local_store.evict_expired() {
        tracing::warn!("Startup eviction failed: {}", e);
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
    let quiet = args.json;
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if !quiet {
                eprintln!("[{:>3}%] {:?}", update.percent, update.stage);
            }
        }
    });

    let progress = ChannelProgress::new(tx);
    let outcome = state.orchestrator.run(&submission, &progress).await;
    drop(progress);
    let _ = printer.await;

    let outcome = outcome.context("analysis failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// Uses the configured oracle, or a stand-in that fails only when a dispatch is needed
fn build_oracle(settings: &AppSettings) -> Result<Arc<dyn AnalysisOracle>> {
    match settings
        .oracle
        .client_config()
        .and_then(ChatCompletionsOracle::new)
    {
        Ok(oracle) => Ok(Arc::new(oracle)),
        Err(CoreError::ConfigError(reason)) => Ok(Arc::new(UnconfiguredOracle::new(&reason))),
        Err(e) => Err(e.into()),
    }
}

fn build_submission(args: &AnalyzeArgs) -> Result<Submission> {
    if let Some(text) = &args.text {
        return Ok(Submission::text(text));
    }
    if let Some(url) = &args.url {
        return Ok(Submission::url(url));
    }
    match &args.file {
        Some(path) => file_submission(path),
        None => bail!("one of --text, --url or --file is required"),
    }
}

fn file_submission(path: &Path) -> Result<Submission> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let Some(modality) = Modality::from_mime(mime.essence_str()) else {
        bail!("unsupported file type {} for {}", mime, path.display());
    };

    let mut file = FileRef::new(&name, metadata.len()).with_mime_type(mime.essence_str());
    if modality == Modality::Image {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        file = file.with_data(bytes);
    }

    Ok(Submission::media(modality, file)?)
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let result = &outcome.result;
    println!("Verdict:    {}", result.status.as_str());
    println!("Confidence: {}%", result.confidence);
    println!("Source:     {}", outcome.source);
    println!("Hash:       {}", outcome.fingerprint.short());

    if !result.issues.is_empty() {
        println!("\nIssues:");
        for issue in &result.issues {
            println!("  - {}", issue);
        }
    }

    println!("\nFact check:\n  {}", result.counter_content.fact_check);
    println!("\nShort form:\n  {}", result.counter_content.short_form);
    println!("\nVisual:\n  {}", result.counter_content.visual_content);
}

// ---------------------------------------------------------------------------
// cache
// ---------------------------------------------------------------------------

fn cache(settings: &AppSettings, action: CacheAction) -> Result<()> {
    let store = open_local_store(settings);

    match action {
        CacheAction::Evict => {
            let removed = store.evict_expired().context("eviction failed")?;
            println!("Evicted {} expired entries from {}", removed, store.cache_dir().display());
        }
        CacheAction::Stats => {
            let stats = store.stats().context("failed to read cache")?;
            println!("Directory:  {}", store.cache_dir().display());
            println!("Entries:    {}", stats.entries);
            println!("Unreadable: {}", stats.unreadable);
            println!("TTL:        {}h", settings.cache.ttl_hours);
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                println!("Oldest:     {}", format_millis(oldest));
                println!("Newest:     {}", format_millis(newest));
            }
        }
        CacheAction::Clear => {
            let removed = store.clear().context("failed to clear cache")?;
            println!("Removed {} entries", removed);
        }
    }
    Ok(())
}

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn config(manager: &SettingsManager, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let mut settings = manager.load_with_env();
            mask(&mut settings.oracle.api_key);
            mask(&mut settings.cache.shared.rest_key);
            println!("# {}", manager.settings_path().display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::Init => {
            if manager.settings_path().exists() {
                println!("Settings already exist at {}", manager.settings_path().display());
            } else {
                manager
                    .save(&AppSettings::default())
                    .context("failed to write settings")?;
                println!("Wrote default settings to {}", manager.settings_path().display());
            }
        }
    }
    Ok(())
}

fn mask(secret: &mut Option<String>) {
    if secret.is_some() {
        *secret = Some("********".to_string());
    }
}
