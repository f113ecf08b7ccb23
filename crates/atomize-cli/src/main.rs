//! Atomize CLI - converts legacy page-builder trees into the atomic V4 schema

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

mod config;
mod convert;
mod io;
mod mappings;
mod remote;
mod validate;

#[derive(Parser)]
#[command(name = "atomize")]
#[command(version = atomize_core::VERSION)]
#[command(about = "Convert V3 widget trees into V4 atomic elements", long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace). Overrides RUST_LOG
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a V3 document or element with the built-in mappings
    Convert {
        /// Input JSON file, or - for stdin
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (defaults to ./atomize.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Exit non-zero if anything was dropped
        #[arg(long)]
        strict: bool,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Check a V4 document or element against the target schema
    Validate {
        /// Input JSON file, or - for stdin
        input: PathBuf,
    },

    /// Convert with the configured provider, then validate its output
    Remote {
        /// Input JSON file, or - for stdin
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Config file (defaults to ./atomize.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the effective mapping table as TOML
    Mappings {
        /// Config file (defaults to ./atomize.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let passed = match cli.command {
        Commands::Convert {
            input,
            output,
            config,
            strict,
            compact,
        } => {
            let options = convert::ConvertOptions {
                input,
                output,
                config,
                strict,
                compact,
            };
            convert::run(options)?
        }

        Commands::Validate { input } => validate::run(&input)?,

        Commands::Remote {
            input,
            output,
            config,
            compact,
        } => {
            let options = remote::RemoteOptions {
                input,
                output,
                config,
                compact,
            };
            remote::run(options)?
        }

        Commands::Mappings { config } => {
            mappings::run(config.as_deref())?;
            true
        }
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
