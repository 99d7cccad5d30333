//! `estacionamiento` - command-line host for the parking access monitor.

mod monitor;
mod output;
mod presence;
mod scan;
mod telegram;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use estacionamiento_core::AppConfig;

/// Parking access monitor driven by Telegram commands
#[derive(Parser, Debug)]
#[command(name = "estacionamiento", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "estacionamiento.yml", global = true)]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start monitoring: poll Telegram until Ctrl+C
    Run,

    /// Scan for nearby Bluetooth devices and list them
    Scan(scan::ScanArgs),

    /// Send a one-off message to a chat
    Send(telegram::SendArgs),

    /// Show configuration and the stored update offset
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn should_use_colors(self) -> bool {
        use std::io::IsTerminal;
        match self {
            ColorMode::Auto => std::io::stdout().is_terminal(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| filter.to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli.config)?;
    let use_colors = cli.color.should_use_colors();

    match cli.command {
        Commands::Run => monitor::run(config).await,
        Commands::Scan(args) => scan::run(&config, args, use_colors).await,
        Commands::Send(args) => telegram::send(&config, args, use_colors).await,
        Commands::Status => telegram::status(&cli.config, &config, use_colors),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
