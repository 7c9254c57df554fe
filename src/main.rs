//! cwl2argo CLI Entry Point
//!
//! Provides the command-line interface for transpiling CWL documents.
//!
//! # Usage
//!
//! ```bash
//! # Transpile a tool, using declared defaults for its inputs
//! cwl2argo transpile echo.cwl
//!
//! # With a job order and remote file locations
//! cwl2argo transpile align.cwl --inputs job.yaml --locations locations.json
//!
//! # Look for nested run: documents in extra directories
//! cwl2argo transpile pipeline.cwl --search-path ./tools --search-path /opt/cwl
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{info, warn};

use cwl2argo::{process_file, TranspileConfig, APP_NAME, VERSION};

#[derive(Debug, Parser)]
#[command(name = "cwl2argo")]
#[command(version = VERSION)]
#[command(about = "Transpile Common Workflow Language documents into Argo Workflows")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Transpile a .cwl document into an Argo Workflow",
        after_help = "Example:\n    cwl2argo transpile echo.cwl --inputs job.yaml"
    )]
    Transpile {
        /// Path to the CWL document
        document: PathBuf,

        /// YAML job order with concrete input values
        #[arg(short, long, value_name = "FILE")]
        inputs: Option<PathBuf>,

        /// JSON map of File parameters to HTTP, S3 or HDFS locations
        #[arg(short, long, value_name = "FILE")]
        locations: Option<PathBuf>,

        /// Extra directory to search for nested run: documents
        #[arg(long = "search-path", value_name = "DIR")]
        search_paths: Vec<PathBuf>,
    },
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Main application entry point.
fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    setup_logging(cli.verbose);
    info!("{} v{}", APP_NAME, VERSION);

    match cli.command {
        Command::Transpile {
            document,
            inputs,
            locations,
            search_paths,
        } => {
            let mut config = TranspileConfig::default();
            config.prepend_search_paths(search_paths);

            match process_file(&document, inputs.as_deref(), locations.as_deref(), &config)? {
                Some(written) => println!("{}", written.display()),
                None => warn!("No Argo resource was produced for {}", document.display()),
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
