//! Shakepack CLI - tree-shaking bundler for ES modules

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::BundleArgs;
use shakepack::config::default_config_path;
use shakepack::output::{OutputMode, error_code, error_envelope};

#[derive(Parser)]
#[command(name = "shakepack")]
#[command(version)]
#[command(about = "Tree-shaking bundler for ES modules")]
#[command(long_about = r#"
Shakepack follows the imports of an entry module, keeps only the code that
can affect the program, and writes one file in the module format you need.

Example usage:
  shakepack init
  shakepack bundle src/main.js --format cjs --output dist/bundle.js
  shakepack bundle src/main.js --format umd --name lib --global jquery=jQuery
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print a JSON result instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle an entry module and its dependencies
    Bundle(BundleArgs),

    /// Write a starter shakepack.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Bundle(_) => "bundle",
            Commands::Init { .. } => "init",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("shakepack=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shakepack=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = OutputMode::from_flag(cli.json);
    let command = cli.command.name();
    let result = match cli.command {
        Commands::Bundle(args) => commands::run_bundle(args, cli.config.as_deref(), output_mode).await,
        Commands::Init { force } => {
            let path = cli.config.unwrap_or_else(default_config_path);
            commands::run_init(&path, force, output_mode)
        }
    };

    let Err(err) = result else {
        return Ok(());
    };
    match output_mode {
        OutputMode::Json => {
            let envelope = error_envelope(command, error_code(&err), &format!("{err:#}"));
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        OutputMode::Human => shakepack::ui::error(&format!("{err:#}")),
    }
    std::process::exit(1);
}
