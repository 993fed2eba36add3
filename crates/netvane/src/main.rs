mod cli;
mod provider;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::error;
use semver::Version;

use netvane_core::plugin_system::PluginSystemConfig;
use netvane_core::{PluginManager, PluginState};

use crate::cli::CliConnector;
use crate::provider::PipPackageManager;

/// NetVane: network management with a plugin architecture
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Directory containing bundled plugins
    #[arg(long, default_value = "bundled_plugins")]
    bundled_dir: PathBuf,

    /// Configuration file (TOML); defaults apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every known plugin and its state
    List,
    /// Enable a plugin so it loads on startup
    Enable {
        /// The id of the plugin to enable
        id: String,
    },
    /// Disable a plugin, unloading it first if necessary
    Disable {
        /// The id of the plugin to disable
        id: String,
    },
    /// Unload and load a plugin again
    Reload {
        /// The id of the plugin to reload
        id: String,
    },
    /// Enable bundled plugins and load everything enabled
    LoadAll,
}

async fn build_manager(args: &CliArgs) -> Result<PluginManager, String> {
    let config = match &args.config {
        Some(path) => PluginSystemConfig::from_file(path)
            .await
            .map_err(|e| e.to_string())?,
        None => PluginSystemConfig::default(),
    };

    let host_version: Version = env!("CARGO_PKG_VERSION")
        .parse()
        .map_err(|e| format!("bad package version: {e}"))?;

    let mut manager = PluginManager::new(
        host_version,
        args.bundled_dir.clone(),
        config,
        Arc::new(PipPackageManager),
    );
    manager
        .lifecycle_mut()
        .ui_mut()
        .register_connector(Box::new(CliConnector));

    manager.discover().await.map_err(|e| e.to_string())?;
    Ok(manager)
}

fn print_states(manager: &PluginManager) {
    let mut states: Vec<(String, PluginState)> = manager.plugin_states().into_iter().collect();
    states.sort_by(|a, b| a.0.cmp(&b.0));
    if states.is_empty() {
        println!("No plugins found.");
        return;
    }
    for (id, state) in states {
        match manager.last_error(&id) {
            Some(message) => println!("{id:<30} {state} ({message})"),
            None => println!("{id:<30} {state}"),
        }
    }
}

async fn run(args: CliArgs) -> Result<(), String> {
    let mut manager = build_manager(&args).await?;

    match args.command {
        Commands::List => print_states(&manager),
        Commands::Enable { id } => {
            manager.enable_plugin(&id).await.map_err(|e| e.to_string())?;
            println!("Plugin '{id}' enabled.");
        }
        Commands::Disable { id } => {
            manager.disable_plugin(&id).await.map_err(|e| e.to_string())?;
            println!("Plugin '{id}' disabled.");
        }
        Commands::Reload { id } => {
            manager.enable_plugin(&id).await.map_err(|e| e.to_string())?;
            manager.reload_plugin(&id).await.map_err(|e| e.to_string())?;
            println!("Plugin '{id}' reloaded.");
        }
        Commands::LoadAll => {
            let loaded = manager.load_all().await;
            println!("Loaded {loaded} plugin(s).");
            print_states(&manager);
            manager.unload_all().await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
