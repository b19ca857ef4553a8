use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod face_search;
mod http;
mod object_detect;
mod presenter;
mod speech;
mod vision;

use dbus_interface::{MonitorService, BUS_NAME, OBJECT_PATH};
use presenter::Presenter;
use speech::Speaker;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "deskguardd starting");

    let config = config::Config::from_env();
    let (monitor, events) = engine::spawn_monitor(&config, tokio::runtime::Handle::current())?;
    let monitor = Arc::new(monitor);

    let speaker = Speaker::new(&config.speech_command);
    if speaker.is_muted() {
        tracing::info!("DESKGUARD_SPEECH_COMMAND is empty; speech disabled");
    }
    let (presenter, panel) = Presenter::new(monitor.context(), events, speaker);
    let presenter = tokio::spawn(presenter.run());

    let service = MonitorService::new(monitor.clone(), panel);
    let _connection = match serve(service).await {
        Ok(connection) => connection,
        Err(e) => {
            monitor.shutdown();
            return Err(e.into());
        }
    };

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "deskguardd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("deskguardd shutting down");

    monitor.shutdown();
    if let Err(e) = presenter.await {
        tracing::warn!(error = %e, "presentation task ended abnormally");
    }

    Ok(())
}

async fn serve(service: MonitorService) -> zbus::Result<zbus::Connection> {
    zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
}
