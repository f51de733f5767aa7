// Verse bridge Linux daemon: device link, verse source, favorites store.

mod config;
mod device;
mod logging;
mod runtime;
mod source;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("verse-linux {}", VERSION);
                return Ok(());
            }
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("unknown argument {other:?}"),
        }
    }

    let cfg = config::load(config_path.as_deref())?;
    logging::init(&cfg.log);
    tracing::info!(version = VERSION, port = cfg.device_port, source = %cfg.source_url, "starting");

    let favorites = store::JsonFileStore::new(&cfg.favorites_path);
    tracing::info!(path = %favorites.path().display(), "favorites store");
    let bridge = verse_core::Bridge::new(cfg.core(), favorites);
    let source = Arc::new(source::HttpVerseSource::new(
        cfg.source_url.clone(),
        cfg.http_timeout(),
    )?);
    let device = Arc::new(device::TcpDevice::new(cfg.ack_timeout()));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.device_port))
            .await
            .with_context(|| format!("binding device port {}", cfg.device_port))?;
        tracing::info!(port = cfg.device_port, "waiting for device");

        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let listener_tx = events_tx.clone();
        let listener_device = device.clone();
        tokio::spawn(async move {
            if let Err(e) = device::run_listener(listener, listener_device, listener_tx).await {
                tracing::error!(error = %e, "device listener stopped");
            }
        });
        let event_loop = tokio::spawn(runtime::run(bridge, device, source, events_tx, events_rx));

        shutdown_signal().await?;
        tracing::info!("shutting down");
        event_loop.abort();
        anyhow::Ok(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix). Pending deliveries are dropped on shutdown.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
