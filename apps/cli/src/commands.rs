//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use mediaimport_core::{
    ImportJob, ImportProgress, ImportReport, ImportResult, LibraryMediaStore, RowOutcome,
};
use mediaimport_shared::{AppConfig, LibraryConfig, init_config, load_config};
use mediaimport_storage::Storage;
use tracing::info;

use crate::tag_hook::TagHook;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MediaImport: bulk-import media from a CSV of URLs.
#[derive(Parser)]
#[command(
    name = "media-import",
    version,
    about = "Download the media listed in a CSV file into a local media library.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Import report format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum ReportFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Import every row of a CSV file (requires a `src` column).
    Import {
        /// CSV file to import.
        csv: PathBuf,

        /// Media library directory (defaults to the configured library).
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Tag each imported item with the value of this column.
        #[arg(long)]
        tag_column: Option<String>,

        /// Report format printed after the import.
        #[arg(long, default_value = "text")]
        report: ReportFormat,
    },

    /// List media stored in the library.
    List {
        /// Media library directory (defaults to the configured library).
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Crates whose events the default filter lets through.
const LOG_TARGETS: [&str; 4] = [
    env!("CARGO_CRATE_NAME"),
    "mediaimport_core",
    "mediaimport_storage",
    "mediaimport_shared",
];

/// Default `EnvFilter` directives for a `-v` count.
fn default_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = default_filter(cli.verbose);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import {
            csv,
            library,
            tag_column,
            report,
        } => cmd_import(&csv, library.as_deref(), tag_column.as_deref(), report).await,
        Command::List { library, json } => cmd_list(library.as_deref(), json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the library config from the config file plus an optional `--library` override.
fn library_config(library: Option<&Path>) -> Result<LibraryConfig> {
    let config = load_config()?;
    let lib = LibraryConfig::from(&config);
    Ok(match library {
        Some(root) => lib.with_root(root),
        None => lib,
    })
}

async fn cmd_import(
    csv: &Path,
    library: Option<&Path>,
    tag_column: Option<&str>,
    report_format: ReportFormat,
) -> Result<()> {
    let lib = library_config(library)?;

    info!(
        csv = %csv.display(),
        library = %lib.root.display(),
        "importing media"
    );

    let store = LibraryMediaStore::open(lib.clone()).await?;

    let mut job = ImportJob::new().from_source(csv);
    if let Some(column) = tag_column {
        let storage = Storage::open(&lib.db_path()).await?;
        job = job.on_upload(TagHook::new(storage, column));
    }

    let reporter = CliProgress::new();
    let report = job.run_with_progress(&store, &reporter).await?;

    match report_format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_report(&report),
    }

    Ok(())
}

fn print_report(report: &ImportReport) {
    println!();
    for result in &report.results {
        match &result.outcome {
            RowOutcome::Imported {
                media_id,
                filename,
                hook_errors,
            } => {
                println!("  ok    line {:<4} {filename} ({media_id})", result.line);
                for err in hook_errors {
                    println!("        hook: {err}");
                }
            }
            RowOutcome::Failed { reason } => {
                println!("  FAIL  line {:<4} {} [{reason}]", result.line, result.url);
            }
        }
    }
    println!();
    println!("  Imported: {}", report.succeeded());
    println!("  Failed:   {}", report.failed());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ImportProgress for CliProgress {
    fn row_started(&self, line: u64, url: &str) {
        self.spinner.set_message(format!("Importing [line {line}] {url}"));
    }

    fn row_finished(&self, result: &ImportResult) {
        self.spinner.inc(1);
        if let RowOutcome::Failed { reason } = &result.outcome {
            self.spinner
                .set_message(format!("Skipped [line {}] {reason}", result.line));
        }
    }

    fn done(&self, _report: &ImportReport) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_list(library: Option<&Path>, json: bool) -> Result<()> {
    let lib = library_config(library)?;
    let storage = Storage::open_readonly(&lib.db_path())
        .await
        .map_err(|e| eyre!("no media library at '{}': {e}", lib.root.display()))?;

    let media = storage.list_media().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
        return Ok(());
    }

    if media.is_empty() {
        println!("No media in {}", lib.root.display());
        return Ok(());
    }

    for item in &media {
        let tags = storage.tags_for_media(&item.id).await?;
        println!(
            "{}  {:<32} {:>10}  {}",
            item.id,
            item.filename,
            item.size,
            item.alt_text.as_deref().unwrap_or("-")
        );
        if !tags.is_empty() {
            println!("{:38}tags: {}", "", tags.join(", "));
        }
    }
    println!();
    println!("  {} item(s) in {}", media.len(), lib.root.display());

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
