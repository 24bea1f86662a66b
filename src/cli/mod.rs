//! CLI parser and command dispatch.

mod drivers;
mod process;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, CONFIG_ENV_VAR};

#[derive(Parser)]
#[command(name = "filemeta")]
#[command(about = "Extract document file metadata with pluggable analysis drivers")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to the user config directory)
    #[arg(short, long, global = true, env = CONFIG_ENV_VAR)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// List registered drivers
    Drivers,

    /// Run the drivers configured for a document type on a file
    Process {
        /// File to analyze
        file: PathBuf,
        /// Document type whose driver configurations apply
        #[arg(short = 't', long)]
        document_type: String,
        /// Run only this driver (even if disabled for the document type)
        #[arg(short, long)]
        driver: Option<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Drivers => drivers::cmd_drivers(&config),
        Commands::Process {
            file,
            document_type,
            driver,
            json,
        } => process::cmd_process(&config, &file, &document_type, driver.as_deref(), json).await,
    }
}
