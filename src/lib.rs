pub mod cli;
pub mod core;
pub mod plugin;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::plugin::{ExchangeRatePlugin, NAMESPACE, Namespace};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Transform {
        source: String,
        target: String,
        amount: f64,
    },
    Rate {
        source: String,
        targets: Vec<String>,
    },
    Rates {
        source: String,
    },
    Cached,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("exrate starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = store::open_store(&config)?;
    let provider = Arc::new(providers::OpenErApiProvider::new(&config.provider.base_url));

    let namespace = Arc::new(Namespace::new());
    let mut plugin = ExchangeRatePlugin::new(namespace.clone());
    let rates = plugin
        .load(provider, store)
        .await
        .context("Failed to load exchange rate settings")?;
    let api = namespace
        .get(NAMESPACE)
        .context("Exchange rate API is not registered")?;

    let output = match command {
        AppCommand::Transform {
            source,
            target,
            amount,
        } => {
            let spinner = cli::ui::new_spinner("Fetching exchange rates...");
            let output = cli::convert::transform(api.as_ref(), &source, &target, amount).await;
            spinner.finish_and_clear();
            output
        }
        AppCommand::Rate { source, targets } => {
            let spinner = cli::ui::new_spinner("Fetching exchange rates...");
            let output = cli::convert::rate_table(api.as_ref(), &source, &targets).await;
            spinner.finish_and_clear();
            output
        }
        AppCommand::Rates { source } => {
            let spinner = cli::ui::new_spinner("Fetching exchange rates...");
            let output = cli::rates::rates_table(api.as_ref(), &source).await;
            spinner.finish_and_clear();
            output
        }
        AppCommand::Cached => Ok(cli::rates::cached_table(&rates.cache_status().await)),
    };

    plugin.unload();
    println!("{}", output?);
    Ok(())
}
