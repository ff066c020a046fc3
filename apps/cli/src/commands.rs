//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use hnsift_core::{ChatClassifier, Pipeline, ProgressReporter, RunOptions, RunStats, Stage};
use hnsift_shared::{AppConfig, CrawlerSettings, init_config, load_config, validate_api_key};
use hnsift_storage::DedupStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// hnsift: incremental Hacker News crawler.
#[derive(Parser)]
#[command(
    name = "hnsift",
    version,
    about = "Crawl top Hacker News stories with article text, top comments and topics.",
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl top stories and append new ones to the archive.
    Crawl {
        /// Number of top stories to consider (defaults to `feed.max_stories`).
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Re-fetch stories that were already crawled.
        #[arg(long)]
        all: bool,

        /// Skip topic classification.
        #[arg(long)]
        no_classify: bool,

        /// Data directory (defaults to `storage.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Show what is stored in the data directory.
    Stats {
        /// Data directory (defaults to `storage.data_dir`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hnsift=info",
        1 => "hnsift=debug",
        _ => "hnsift=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Crawl {
            limit,
            all,
            no_classify,
            data_dir,
        } => cmd_crawl(limit, all, no_classify, data_dir).await,
        Command::Stats { data_dir } => cmd_stats(data_dir).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Settings from the config file with the `--data-dir` override applied.
fn resolve_settings(config: &AppConfig, data_dir: Option<PathBuf>) -> CrawlerSettings {
    let mut settings = CrawlerSettings::from(config);
    if let Some(dir) = data_dir {
        settings.data_dir = dir;
    }
    settings
}

async fn cmd_crawl(
    limit: Option<usize>,
    all: bool,
    no_classify: bool,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;

    // Validate API key before doing anything
    let classify = config.classifier.enabled && !no_classify;
    let classifier = if classify {
        let key = validate_api_key(&config)?;
        Some(ChatClassifier::from_config(&config.classifier, key)?)
    } else {
        None
    };

    let settings = resolve_settings(&config, data_dir);
    let opts = RunOptions {
        limit: limit.unwrap_or(settings.max_stories),
        skip_existing: !all,
    };
    if opts.limit == 0 {
        return Err(eyre!("--limit must be at least 1"));
    }

    info!(
        limit = opts.limit,
        skip_existing = opts.skip_existing,
        classify,
        data_dir = %settings.data_dir.display(),
        "starting crawl"
    );

    let pipeline = Pipeline::from_settings(&settings, classifier).await?;
    let reporter = CliProgress::new()?;
    let report = pipeline.run(&opts, &reporter).await?;
    let stats = &report.stats;

    println!();
    println!("  Crawl complete ({})", stats.run_id);
    println!("  Top stories:      {}", stats.total_ids);
    println!("  Already crawled:  {}", stats.skipped_existing);
    println!("  Fetched:          {}", stats.total_fetched);
    println!("  New articles:     {}", stats.new_articles);
    println!(
        "  Content:          {} ok, {} failed, {} skipped",
        stats.content_success, stats.content_failed, stats.content_skipped
    );
    println!("  Comments:         {}", stats.comments_parsed);
    if classify {
        println!(
            "  Classified:       {} ({} fallbacks)",
            stats.classified, stats.classification_fallbacks
        );
    }
    if stats.failed_logged > 0 {
        println!("  Failed (logged):  {}", stats.failed_logged);
    }
    if let Some(finished) = stats.finished_at {
        let elapsed = finished - stats.started_at;
        println!(
            "  Time:             {:.1}s",
            elapsed.num_milliseconds() as f64 / 1000.0
        );
    }
    println!();

    Ok(())
}

async fn cmd_stats(data_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let settings = resolve_settings(&config, data_dir);

    let store = DedupStore::open(&settings.data_dir).await?;
    let stats = store.stats().await?;

    println!();
    println!("  Data directory:   {}", store.dir().display());
    println!("  Articles:         {}", stats.article_count);
    println!("  Crawled ids:      {}", stats.dedup_id_count);
    println!("  Failed items:     {}", stats.failed_count);
    if stats.articles_exists {
        println!(
            "  Article file:     {} ({} bytes)",
            stats.articles_path.display(),
            stats.articles_size_bytes
        );
    } else {
        println!("  Article file:     (none yet)");
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map_err(|e| eyre!("invalid progress template: {e}"))?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { spinner })
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        self.spinner.set_message(stage.label());
    }

    fn done(&self, _stats: &RunStats) {
        self.spinner.finish_and_clear();
    }
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
