use std::path::PathBuf;
use std::sync::Arc;

use airstage_local::{
    AccessoryManager, DeviceClient, DeviceRegistry, LogHost, PlatformConfig, ScaleStore,
    log_config_error, spawn_poller,
};
use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bridge a Fujitsu Airstage unit on the local network to a home-automation host.
#[derive(Parser, Debug)]
#[command(name = "airstage-bridge", version, about, long_about = None)]
struct Args {
    /// Platform config (JSON).
    #[arg(short, long, env = "AIRSTAGE_CONFIG")]
    config: PathBuf,

    /// Tracing filter, e.g. `debug` or `airstage_local=trace`. Defaults to RUST_LOG, then `info`.
    #[arg(long)]
    log_filter: Option<String>,

    /// Refresh every accessory once and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match &args.log_filter {
        Some(directives) => EnvFilter::try_new(directives).context("invalid --log-filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = PlatformConfig::from_path(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let record = match config.local_device.validate() {
        Ok(record) => record,
        Err(e) => {
            log_config_error(&e);
            bail!("no usable device in {}", args.config.display());
        }
    };
    let device_id = record.id.clone();
    info!(device = %device_id, address = %record.address, name = %record.name, "configured device");

    let mut builder = DeviceClient::builder(DeviceRegistry::from_records([record])?);
    if let Some(dir) = &config.persist_path {
        builder = builder.scale_store(ScaleStore::open(dir)?);
    }
    if let Some(path) = &config.message_log_path {
        builder = builder.message_log(config.message_log_mode, path);
    }
    let client = Arc::new(builder.build()?);

    client
        .probe(device_id.as_str())
        .await
        .context("device did not answer the connectivity probe")?;

    let manager = Arc::new(AccessoryManager::new(client, Arc::new(LogHost)));
    manager
        .configure_device(device_id.as_str(), &config.features)
        .await?;
    let summary = manager.refresh_device(device_id.as_str(), false).await?;
    info!(notified = summary.notified, failed = summary.failed, "initial refresh done");

    if args.once {
        return Ok(());
    }

    let poller = spawn_poller(
        manager.clone(),
        device_id,
        config.local_device.polling_interval(),
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    if let Some(handle) = poller {
        handle.abort();
    }
    Ok(())
}
