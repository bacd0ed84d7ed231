mod config_cmd;
mod demo_cmd;
mod inspect_cmd;
mod runtime;
mod terminal_output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use plugcache_config::{config_dir, config_file_path, load_and_prepare, PlugCacheConfig};
use tracing::error;

use demo_cmd::DemoArgs;

#[derive(Parser)]
#[command(name = "plugcache")]
#[command(about = "plugcache - runtime plugin loader with an expiring instance cache")]
#[command(version)]
struct Cli {
    /// Config file (defaults to config.yaml in the plugcache config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cache lifecycle against a greeter module
    Demo {
        /// Shared library exporting a greeter
        #[arg(short, long)]
        module: Option<PathBuf>,
        /// Qualified type name to instantiate
        #[arg(short = 't', long = "type", default_value = plugcache_demo_plugin::GREETER_TYPE)]
        type_name: String,
        /// Lifetime of the short-lived entry, in seconds
        #[arg(long, default_value_t = 1)]
        ttl: u64,
        /// Use the compiled-in demo module instead of a shared library
        #[arg(long)]
        builtin: bool,
    },
    /// List the types a module exports
    Inspect {
        path: PathBuf,
    },
    /// Show or initialise configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a config file with defaults
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));

    let result = match cli.command {
        Commands::Config { action } => config_cmd::run(action, &config_path).await,
        Commands::Demo { module, type_name, ttl, builtin } => match prepare(&config_path).await {
            Ok(config) => {
                let args = DemoArgs {
                    module,
                    type_name,
                    ttl_secs: ttl,
                    builtin,
                };
                demo_cmd::run(&config, args).await
            }
            Err(e) => Err(e),
        },
        Commands::Inspect { path } => match prepare(&config_path).await {
            Ok(config) => inspect_cmd::run(&config, &path),
            Err(e) => Err(e),
        },
    };

    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "Command failed");
        terminal_output::note_error(&format!("{e:#}"));
    }
    result
}

/// Load the config and install logging from it.
async fn prepare(config_path: &Path) -> Result<PlugCacheConfig> {
    let config = load_and_prepare(config_path).await?;
    runtime::init_logging(&config);
    Ok(config)
}
