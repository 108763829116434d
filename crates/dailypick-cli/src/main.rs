use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dailypick_core::{EngineError, SelectionError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "dailypick", version, about = "Daily picks, quotas and streaks")]
struct Cli {
    /// JSON catalog to use instead of the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Today's pick and "generate again"
    Pick {
        #[command(subcommand)]
        action: commands::pick::PickAction,
    },
    /// Daily usage limits
    Quota {
        #[command(subcommand)]
        action: commands::quota::QuotaAction,
    },
    /// XP and day streaks
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Browse the content catalog
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("DAILYPICK_LOG")
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Outcomes the user caused, as opposed to faults.
fn calm_message(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    if let Some(e) = err.downcast_ref::<EngineError>() {
        return Some(e.user_message());
    }
    err.downcast_ref::<SelectionError>()
        .map(|e| e.user_message().to_string())
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let catalog = cli.catalog.as_deref();
    let result = match cli.command {
        Commands::Pick { action } => commands::pick::run(action, catalog),
        Commands::Quota { action } => commands::quota::run(action, catalog),
        Commands::Streak { action } => commands::streak::run(action, catalog),
        Commands::Catalog { action } => commands::catalog::run(action, catalog),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        if let Some(message) = calm_message(e.as_ref()) {
            println!("{message}");
            std::process::exit(2);
        }
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
