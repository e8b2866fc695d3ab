use std::sync::Arc;

use mrga_core::playback::PlaybackUpdate;
use mrga_core::{
    CatalogClient, HttpChatTransport, SessionCore, SessionEvent, SessionOptions, SessionUpdate,
};
use mrga_daemon::{http, mpv::MpvDevice};
use mrga_proto::config::Config;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = mrga_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("mrga.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("mrga log: {}", log_path.display());
    info!("mrga-daemon starting…");

    // ── Config ───────────────────────────────────────────────────────────────
    let config = Config::load()?;
    let base_url = config.api.base_url().to_string();
    info!(
        "Config from {:?}: {:?} API at {}",
        Config::config_path(),
        config.api.environment,
        base_url
    );

    // ── Catalog + capabilities ───────────────────────────────────────────────
    let client = reqwest::Client::new();
    let catalog_client = CatalogClient::new(client.clone(), &base_url);
    let catalog = catalog_client.fetch().await;

    let device = Arc::new(MpvDevice::new(config.mpv.binary.clone()));
    let transport = Arc::new(HttpChatTransport::new(client, &base_url));

    // ── SessionCore ──────────────────────────────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<SessionUpdate>(1024);
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(256);

    let core = SessionCore::new(
        SessionOptions::from_config(&config),
        Arc::clone(&device),
        transport,
        catalog,
        Some(catalog_client),
        broadcast_tx,
    );
    let state_manager = core.state_manager();

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            state_manager,
            event_tx.clone(),
        );
    }

    tokio::spawn(log_playback(broadcast_rx));

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            let _ = shutdown_tx.send(SessionEvent::Shutdown).await;
        }
    });

    info!("Session initialised, running event loop");
    core.run(event_rx).await;
    device.shutdown().await;
    info!("mrga-daemon stopped");

    Ok(())
}

/// Mirror playback status lines into the log.
async fn log_playback(mut rx: broadcast::Receiver<SessionUpdate>) {
    loop {
        match rx.recv().await {
            Ok(SessionUpdate::Playback(PlaybackUpdate::State(snapshot))) => {
                if let Some(line) = snapshot.status_line() {
                    info!("player: {}", line);
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("status logger lagged by {} updates", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
