//! HTTP server and static asset serving
//!
//! Implements the axum server with routes for the WebSocket stream, the
//! stats endpoint and the embedded viewer page.

use axum::Router;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use rust_embed::RustEmbed;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::ViewerRouter;

/// Embedded static assets (browser viewer)
#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

/// Determine Content-Type header for a file path
fn content_type_for(path: &str) -> &'static str {
    if path.ends_with(".html") {
        "text/html; charset=utf-8"
    } else if path.ends_with(".js") {
        "application/javascript; charset=utf-8"
    } else if path.ends_with(".css") {
        "text/css; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

/// Serve static assets from embedded files
async fn serve_asset(uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/');

    if path.is_empty() {
        path = "index.html";
    }

    match Assets::get(path) {
        Some(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(path))],
            content.data,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Build the axum application router
///
/// Separated from `run_server` to enable testing without TCP binding.
pub(crate) fn build_app(router: ViewerRouter) -> Router {
    Router::new()
        .route("/ws", get(crate::router::ws_handler))
        .route("/stats", get(crate::router::stats_handler))
        .fallback(serve_asset)
        .with_state(router)
}

/// Serve on an already-bound listener until `cancel` fires
pub async fn run_server(
    listener: TcpListener,
    router: ViewerRouter,
    cancel: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = build_app(router);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "alphacast server listening");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
