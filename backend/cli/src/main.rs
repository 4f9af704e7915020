mod check_config_cmd;
mod config;
mod extract_cmd;
mod init_cmd;
mod run_cmd;
mod terminal_output;
mod transport;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docintake_core::DocumentKind;
use docintake_logging::init_logger;

use config::ConfigSource;

#[derive(Parser)]
#[command(name = "docintake")]
#[command(about = "docintake: identity document intake over chat, powered by a vision model")]
#[command(version)]
struct Cli {
    /// Config file (default: $DOCINTAKE_CONFIG_DIR/config.yaml or ~/.docintake/config.yaml)
    #[arg(short, long, global = true, env = "DOCINTAKE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overriding `logging.level`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read inbound events as JSON lines on stdin and write session events to stdout
    Run {
        /// Load the model before reading events
        #[arg(long)]
        warm: bool,
    },
    /// Validate and extract one image
    Extract {
        /// Document kind (identity_card, drivers_license, log_card)
        #[arg(short, long)]
        kind: DocumentKind,
        /// Image file
        image: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the config and print it with secrets masked
    CheckConfig,
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let source = ConfigSource::resolve(cli.config);
    let raw = source.read_raw().await?;
    let logging = config::logging_settings(&raw);
    let level = cli.log_level.unwrap_or_else(|| logging.level().to_string());
    let _guard = init_logger(logging.dir.as_deref().map(std::path::Path::new), &level);

    match cli.command {
        Commands::Run { warm } => run_cmd::run(&source, &raw, warm).await,
        Commands::Extract { kind, image, json } => extract_cmd::run(&raw, kind, &image, json).await,
        Commands::CheckConfig => check_config_cmd::run(&source, &raw),
        Commands::Init { force } => init_cmd::run(&source, force).await,
    }
}
