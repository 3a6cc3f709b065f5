//! Data Recycler Binary
//!
//! Starts the historical bar replay server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin data-recycler
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `RECYCLER_SYMBOLS`: Comma-separated symbols to replay
//! - `RECYCLER_DATA_FILE`: CSV bar file backing the row source
//!
//! ## Optional
//! - `RECYCLER_MODE`: single_pass | loop | date_range (default: single_pass)
//! - `RECYCLER_SPEED`: Replay speed multiplier (default: 1.0)
//! - `RECYCLER_LOOP_COUNT`: -1 for infinite, else pass count (default: -1)
//! - `RECYCLER_START_DATE` / `RECYCLER_END_DATE`: RFC 3339 window bounds
//! - `RECYCLER_PROXY_SYMBOL`: Proxy for requested symbols without data
//! - `RECYCLER_BIND_ADDR`: Bind address (default: 127.0.0.1)
//! - `RECYCLER_PORT`: WebSocket port (default: 8765)
//! - `RECYCLER_BASE_INTERVAL_SECS`: Nominal bar spacing (default: 60)
//! - `RECYCLER_BROADCAST_CAPACITY`: Tick channel capacity (default: 1024)
//! - `RUST_LOG`: Log level (default: info)

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use data_recycler::application::BarSource;
use data_recycler::infrastructure::broadcast::TickHub;
use data_recycler::infrastructure::source::CsvBarSource;
use data_recycler::infrastructure::stream::StreamServer;
use data_recycler::infrastructure::telemetry;
use data_recycler::{RecyclerSettings, ReplaySequencer, resolve_symbols};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    telemetry::init();

    tracing::info!("Starting Data Recycler");

    let settings = RecyclerSettings::from_env()?;
    log_config(&settings);

    let data_file = settings
        .data_file
        .as_deref()
        .context("RECYCLER_DATA_FILE must point at a CSV bar file")?;
    let source = Arc::new(
        CsvBarSource::from_path(data_file)
            .with_context(|| format!("failed to load bars from {}", data_file.display()))?,
    );

    let available: BTreeSet<String> = source.available_symbols().into_iter().collect();
    let mapping = resolve_symbols(
        &settings.replay.symbols,
        &available,
        settings.proxy_symbol.as_deref(),
    )?;
    tracing::info!(
        symbols = mapping.len(),
        proxied = mapping.proxied().count(),
        "Symbol mapping resolved"
    );

    let shutdown_token = CancellationToken::new();
    let hub = Arc::new(TickHub::new(settings.broadcast_capacity));

    let server = StreamServer::bind(
        &settings.server.socket_addr(),
        Arc::clone(&hub),
        shutdown_token.clone(),
    )
    .await?;
    let stats = server.stats();
    tracing::info!(addr = %server.local_addr(), "Stream server listening");

    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "Stream server error");
        }
        tracing::info!("Stream server stopped");
    });

    let mut sequencer = ReplaySequencer::new(
        settings.replay,
        mapping,
        source,
        hub,
        shutdown_token.clone(),
    );
    sequencer.load()?;
    tracing::info!(bars_per_pass = sequencer.pass_len(), "Replay session loaded");

    let session = tokio::spawn(sequencer.run());

    await_shutdown(shutdown_token).await;

    match session.await {
        Ok(Ok(summary)) => {
            tracing::info!(
                ticks_emitted = summary.ticks_emitted,
                passes_completed = summary.passes_completed,
                clients_served = stats.served(),
                "Replay session finished"
            );
        }
        Ok(Err(e)) => tracing::error!(error = %e, "Replay session failed"),
        Err(e) => tracing::error!(error = %e, "Replay session panicked"),
    }

    tracing::info!("Data Recycler stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(settings: &RecyclerSettings) {
    tracing::info!(
        mode = settings.replay.mode.as_str(),
        speed = settings.replay.speed_multiplier,
        loop_count = settings.replay.loop_count,
        bind_addr = %settings.server.bind_addr,
        port = settings.server.port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT), or for the replay session
/// itself to end and cancel the token.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Replay session complete, shutting down");
        }
    }

    shutdown_token.cancel();
}
