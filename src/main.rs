mod capability;
mod config;
mod core;
mod domain;
mod error;
mod session;
mod transform;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::capability::HttpCapability;
use crate::config::RugEditConfig;
use crate::core::app::{self, App};

/// Interactive region editor for layered design images.
///
/// Reads commands from stdin; type `help` for the list.
#[derive(Parser, Debug)]
#[command(name = "rugedit", version)]
struct Args {
    /// Editing service base URL (overrides the config file)
    #[arg(long, env = "RUGEDIT_SERVER", value_name = "URL")]
    server: Option<String>,

    /// Config file (default: <config dir>/rugedit/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Maximum history snapshots; 0 keeps every snapshot
    #[arg(long, value_name = "N")]
    history_limit: Option<usize>,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    save_config: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = RugEditConfig::load(args.config.as_deref());
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(limit) = args.history_limit {
        config.history_limit = (limit > 0).then_some(limit);
    }
    if args.save_config {
        let path = match args.config {
            Some(path) => path,
            None => RugEditConfig::default_path()?,
        };
        config.save_to(&path)?;
        log::info!("Saved config to {}", path.display());
    }

    let capability = HttpCapability::new(&config.server_url, &config.api_prefix, config.connect_timeout())?;
    println!("rugedit: using {} (type 'help' for commands)", config.server_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(app::run(App::new(capability, config)))
}
