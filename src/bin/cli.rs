//! Change detector CLI
//!
//! Local execution entry point. For AWS Lambda, use `change-detector-lambda`.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use change_detector::{
    error::Result,
    models::{Config, parse_locales},
    pipeline,
    services::Services,
    storage::{self, LockStatus, RunLock, StateStore},
    utils::console,
};

/// Product catalog change detector
#[derive(Parser, Debug)]
#[command(
    name = "change-detector",
    version,
    about = "Detects catalog changes and reconciles published product pages"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "storage/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one reconciliation pass
    Poll {
        /// Comma-separated locales overriding the configured ones
        #[arg(long)]
        locales: Option<String>,
    },

    /// Validate the configuration
    Validate,

    /// Inspect or remove a locale's state
    State {
        #[command(subcommand)]
        action: StateAction,
    },

    /// Wait for the running pass to finish, then delete locale states
    Reset {
        /// Comma-separated locales to reset
        #[arg(long)]
        locales: String,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },

    /// Show the run lease
    Lock,
}

#[derive(Subcommand, Debug)]
enum StateAction {
    /// Print a summary of the state
    Show {
        /// Locale to inspect (default locale if omitted)
        #[arg(long)]
        locale: Option<String>,

        /// Print every entry
        #[arg(long)]
        entries: bool,
    },

    /// Delete the state so every product is rendered again
    Delete {
        #[arg(long)]
        locale: Option<String>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    console::init(level);
}

fn locale_list(value: &str) -> Vec<Option<String>> {
    let locales = parse_locales(value);
    if locales.is_empty() {
        vec![None]
    } else {
        locales.into_iter().map(Some).collect()
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();
    init_logging(cli.verbose, &config.logging.level);

    log::info!("Loaded configuration from {}", cli.config.display());

    let store = storage::open(&config.storage).await?;

    match cli.command {
        Command::Poll { locales } => {
            if let Some(locales) = locales {
                config.site.locales = parse_locales(&locales);
            }

            console::header("Change detector poll");
            let services = Services::from_config(&config, store)?;
            let result = pipeline::run(&config, services).await?;

            console::summary("Run", &console::run_summary_items(&result));
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            console::step(1, 2, "Required parameters");
            if let Err(e) = config.check_params() {
                console::error(&e.to_string());
                return Err(e);
            }

            console::step(2, 2, "Settings");
            if let Err(e) = config.validate() {
                console::error(&e.to_string());
                return Err(e);
            }

            console::success("All validations passed!");
        }

        Command::State { action } => {
            let states = StateStore::new(store, config.poller.state_prefix.clone());
            match action {
                StateAction::Show { locale, entries } => {
                    let state = states.load(locale.as_deref()).await;
                    console::summary(
                        &format!("State {}", states.location(locale.as_deref())),
                        &[
                            ("SKUs", state.len().to_string()),
                            ("Rendered", state.rendered_count().to_string()),
                        ],
                    );
                    if entries {
                        println!("{}", state.encode());
                    }
                }
                StateAction::Delete { locale } => {
                    states.delete(locale.as_deref()).await?;
                    console::success(&format!(
                        "Deleted {}",
                        states.location(locale.as_deref())
                    ));
                }
            }
        }

        Command::Reset {
            locales,
            timeout_secs,
        } => {
            let locales = locale_list(&locales);
            let services = Services::from_config(&config, store)?;
            pipeline::reset_locales(
                &config,
                &services,
                &locales,
                Duration::from_secs(timeout_secs),
            )
            .await?;
            for locale in &locales {
                console::sub_item(&format!(
                    "Reset {}",
                    locale.as_deref().unwrap_or("default")
                ));
            }
            console::success("Locale states deleted; the next poll re-renders them");
        }

        Command::Lock => {
            let lock = RunLock::new(store, &config.poller.state_prefix);
            match lock.status().await? {
                LockStatus::Free => console::info("No run in progress"),
                LockStatus::Held { owner, expires_at } => {
                    console::info(&format!("Run {} holds the lease until {}", owner, expires_at))
                }
                LockStatus::Expired { owner } => {
                    console::warn(&format!("Lease of run {} has expired", owner))
                }
            }
        }
    }

    Ok(())
}
