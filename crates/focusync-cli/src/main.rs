use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusync-cli", version, about = "Focusync offline sync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pending operation queue
    Queue {
        #[command(subcommand)]
        action: commands::queue::QueueAction,
    },
    /// Operations dropped after failing
    Failed {
        #[command(subcommand)]
        action: commands::failed::FailedAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print the retry backoff schedule
    Backoff,
    /// Drain or reconcile against the remote store
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSYNC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Queue { action } => commands::queue::run(action),
        Commands::Failed { action } => commands::failed::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Backoff => commands::backoff::run(),
        Commands::Sync { action } => commands::sync::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
