use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod simulate;
pub mod version;

use config::AgoraConfig;

#[derive(Parser)]
#[command(name = "agora")]
#[command(author = "Agora Project")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator CLI for the Agora governance engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a scripted scenario and print the event log as JSON
    Simulate {
        /// Path to the scenario file (TOML)
        #[arg(long)]
        scenario: PathBuf,

        /// Path to config file (default: ~/.config/agora/config.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// CBOR world snapshot to resume from (if it exists) and save to
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Output path (default: ~/.config/agora/config.toml)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

pub fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Simulate {
            scenario,
            config,
            state,
        } => {
            let config = AgoraConfig::resolve(config.as_deref())?;
            init_logging(&config.logging.level);
            simulate::execute(&scenario, &config, state.as_deref())
        }
        Commands::InitConfig { output, force } => {
            let path = output.unwrap_or_else(config::default_config_path);
            if path.exists() && !force {
                return Err(format!(
                    "Config file '{}' already exists (use --force to overwrite)",
                    path.display()
                )
                .into());
            }
            AgoraConfig::create_default(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
