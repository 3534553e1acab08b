//! posterbot CLI
//!
//! Each command is an independent batch run over the same storage directory.
//! Never run two of them at once against the same store.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use posterbot::{
    error::Result,
    models::Config,
    pipeline::{self, PublishOutcome},
    storage::{CheckpointStore, LocalStorage, PosterStore},
};
use tokio_util::sync::CancellationToken;

/// posterbot - Poster Catalog Rotation Bot
#[derive(Parser, Debug)]
#[command(
    name = "posterbot",
    version,
    about = "Crawl, moderate and publish catalog posters in a fair rotation"
)]
struct Cli {
    /// Path to storage directory containing the store and config files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch catalog pages into the store, resuming from the last checkpoint
    Crawl,

    /// Classify unchecked posters
    Annotate,

    /// Publish the least-published safe poster
    Publish {
        /// Print what would be posted without posting or saving anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Dedupe and normalize the store
    Optimize,

    /// Validate configuration
    Validate,

    /// Show store statistics
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl-C so long-running loops can stop between attempts.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current step...");
            token.cancel();
        }
    });
}

fn print_outcome(outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::DryRun(preview) => {
            println!("--- DRY RUN ---");
            println!("Poster: {:#?}", preview.poster);
            println!(
                "Largest Image URL: {}",
                preview.image_url.as_deref().unwrap_or("(none)")
            );
            println!(
                "Alt Text: {}",
                if preview.alt_text.is_empty() {
                    "(none)"
                } else {
                    preview.alt_text.as_str()
                }
            );
            println!("Status Text:\n{}", preview.status_text);
            println!("--- END DRY RUN ---");
        }
        PublishOutcome::Published {
            poster_id,
            status_id,
            posted_count,
        } => {
            log::info!(
                "Published {} as status {} (now posted {} times)",
                poster_id,
                status_id,
                posted_count
            );
        }
        PublishOutcome::Failed { poster_id, reason } => {
            log::error!("Publishing {} failed: {}", poster_id, reason);
        }
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let config = Config::load_or_default(&config_path);
    let storage = LocalStorage::new(&cli.storage_dir);

    log::debug!("Using storage directory {}", cli.storage_dir.display());

    match cli.command {
        Command::Crawl => {
            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());
            pipeline::run_crawler(&config, &storage, token).await?;
        }

        Command::Annotate => {
            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());
            pipeline::run_annotator(&config, &storage, token).await?;
        }

        Command::Publish { dry_run } => {
            let outcome = pipeline::run_publish(&config, &storage, dry_run).await?;
            print_outcome(&outcome);
        }

        Command::Optimize => {
            pipeline::run_optimize(&config, &storage).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let store = PosterStore::open(storage.clone(), &config.store.posters_file).await?;
            let stats = store.stats();
            let checkpoints = CheckpointStore::new(storage, &config.store.checkpoint_file);

            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Posters: {}", stats.total);
            log::info!("Unchecked: {}", stats.unchecked);
            log::info!("Eligible: {}", stats.eligible);
            log::info!("Flagged: {}", stats.flagged);
            if let (Some(min), Some(max)) = (stats.min_posted, stats.max_posted) {
                log::info!(
                    "Posted counts: {}..{} (skew {})",
                    min,
                    max,
                    stats.fairness_skew()
                );
            }
            match checkpoints.load().await {
                Some(url) => log::info!("Crawl checkpoint: {}", url),
                None => log::info!("No crawl in progress."),
            }
        }
    }

    Ok(())
}
