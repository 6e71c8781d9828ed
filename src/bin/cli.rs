//! Nuri Crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use nuri_crawler::{
    driver::ChromeDriver,
    error::Result,
    models::Config,
    pipeline,
    storage::{CheckpointStore, FileCheckpointStore, Repository, SqliteRepository},
};

/// Nuri - Procurement Bid Notice Crawler
#[derive(Parser, Debug)]
#[command(
    name = "nuri-crawler",
    version,
    about = "Resumable crawler for the Nuri bid notice board"
)]
struct Cli {
    /// Path to storage directory containing config, database and checkpoint
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the bid notice list and save the notices
    Crawl {
        /// Ignore the saved checkpoint and start from page 1
        #[arg(long)]
        fresh: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show checkpoint and repository state
    Info,

    /// Delete the saved checkpoint
    Reset,

    /// Extract one notice from a saved detail page and print it as JSON
    Extract {
        /// Saved detail page HTML
        html: PathBuf,

        /// Combined `code-degree` number to assign
        #[arg(long)]
        code: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
///
/// `RUST_LOG` wins when set; otherwise everything is accepted and the level is
/// narrowed by [`apply_log_level`] once the config is known.
fn init_logging(verbose: bool) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .format_timestamp_secs()
        .init();
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        });
    }
}

/// Apply `logging.level` from the config unless `-v` or `RUST_LOG` overrides it.
fn apply_log_level(verbose: bool, level: &str) {
    if verbose || std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    match level.parse::<log::LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("Unknown log level '{}'; keeping info", level),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    // Load configurations
    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    apply_log_level(cli.verbose, &config.logging.level);

    log::info!("Nuri Crawler starting...");
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let checkpoints =
        FileCheckpointStore::new(config.storage.checkpoint_path(&cli.storage_dir));

    match cli.command {
        Command::Crawl { fresh, headful } => {
            config.validate()?;
            if fresh {
                log::info!("Starting fresh; removing checkpoint");
                checkpoints.clear().await?;
            }
            crawl(&config, &cli.storage_dir, &checkpoints, headful).await?;
            log::info!("Crawl complete!");
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} field rules, date mode {:?})",
                config.fields.len(),
                config.search.date.mode
            );

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            match checkpoints.load().await {
                Ok(Some(checkpoint)) => log::info!("Checkpoint: {}", checkpoint),
                Ok(None) => log::info!("Checkpoint: none (next run starts at page 1)"),
                Err(e) => log::warn!("Checkpoint unreadable: {}", e),
            }

            let db_path = config.storage.database_path(&cli.storage_dir);
            if db_path.exists() {
                let mut repository = SqliteRepository::new(&db_path);
                repository.connect().await?;
                log::info!("Stored notices: {}", repository.count().await?);
                match repository.last_seen().await? {
                    Some(seen) => log::info!("Last posting date: {}", seen.last_date),
                    None => log::info!("No notices stored yet."),
                }
                repository.close().await?;
            } else {
                log::info!("No database found yet.");
            }
        }

        Command::Reset => {
            checkpoints.clear().await?;
            log::info!("Checkpoint removed: {}", checkpoints.path().display());
        }

        Command::Extract { html, code } => {
            let notice = pipeline::run_extract(&config, &html, code.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&notice)?);
        }
    }

    log::info!("Done!");

    Ok(())
}

/// Launch the browser, run the pipeline, and always shut the browser down.
async fn crawl(
    config: &Config,
    storage_dir: &Path,
    checkpoints: &FileCheckpointStore,
    headful: bool,
) -> Result<()> {
    let mut browser = config.browser.clone();
    if headful {
        browser.headless = false;
    }

    let driver = ChromeDriver::launch(&browser).await?;
    let mut repository = SqliteRepository::new(config.storage.database_path(storage_dir));

    let result = pipeline::run_crawler(config, &driver, checkpoints, &mut repository).await;
    driver.close().await;

    let report = result?;
    log::info!(
        "Saved {} of {} collected notices",
        report.saved,
        report.collected
    );
    Ok(())
}
