mod bridge;
mod cli;
mod dispatcher;
mod hub;
mod producer;
mod registry;
mod router;
mod server;
mod sink;


use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use alphacast_core::{FrameCodec, TestPattern};

use crate::hub::Hub;
use crate::router::ViewerRouter;

#[tokio::main]
async fn main() {
    // Initialize tracing with RUST_LOG support
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();

    info!(
        bind = %cli.bind,
        port = cli.port,
        quality = cli.quality,
        fps = cli.fps,
        width = cli.width,
        height = cli.height,
        "alphacast starting"
    );

    let codec = FrameCodec::new(cli.quality);
    let (hub, hub_handle, bridge) = Hub::new(cli.hub_config(), Arc::new(codec));

    let cancel = CancellationToken::new();
    let hub_task = tokio::spawn(hub.run(cancel.clone()));

    // Producer thread feeding the test pattern through the bridge
    let stop = Arc::new(AtomicBool::new(false));
    let producer = match producer::spawn_producer(
        TestPattern::new(cli.width, cli.height),
        bridge,
        cli.fps,
        Arc::clone(&stop),
    ) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start frame producer: {}", e);
            std::process::exit(1);
        }
    };

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        signal_cancel.cancel();
    });

    let listener = match TcpListener::bind((cli.bind, cli.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}:{}: {}", cli.bind, cli.port, e);
            std::process::exit(1);
        }
    };

    // Serve until ctrl-c
    let result = server::run_server(listener, ViewerRouter::new(hub_handle), cancel.clone()).await;

    cancel.cancel();
    stop.store(true, Ordering::Release);
    if let Err(e) = hub_task.await {
        error!("Broadcast hub task failed: {}", e);
    }
    match tokio::task::spawn_blocking(move || producer.join()).await {
        Ok(Ok(stats)) => info!(
            produced = stats.produced,
            dropped = stats.dropped,
            "Frame producer joined"
        ),
        Ok(Err(_)) => error!("Frame producer thread panicked"),
        Err(e) => error!("Failed to join frame producer: {}", e),
    }

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("alphacast shut down");
}
