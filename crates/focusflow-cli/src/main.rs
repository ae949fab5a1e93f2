use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusflow", version, about = "FocusFlow CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus / break cycle
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Run timer
    Run {
        #[command(subcommand)]
        action: commands::run::RunAction,
    },
    /// Energy balance
    Energy {
        #[command(subcommand)]
        action: commands::energy::EnergyAction,
    },
    /// Energy-gated game
    Game {
        #[command(subcommand)]
        action: commands::game::GameAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Recorded activity
    History {
        /// Number of records to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Log to stderr, filtered by FOCUSFLOW_LOG (defaults to warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Run { action } => commands::run::run(action),
        Commands::Energy { action } => commands::energy::run(action),
        Commands::Game { action } => commands::game::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::History { limit } => commands::history::run(limit),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
