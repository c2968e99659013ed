pub mod csv_export;
pub mod download;
pub mod error;
pub mod symbolicate;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/symbolicate/v4", post(symbolicate::handle))
        .route("/", post(symbolicate::handle))
        .route("/missingsymbols.csv", get(csv_export::handle))
        .route("/__lbheartbeat__", get(heartbeat))
        .route(
            "/:debug_file/:debug_id/:symbol_filename",
            get(download::get).head(download::head),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn heartbeat() -> &'static str {
    "ok"
}

/// True when the request carries a `Debug` header with a truthy value, the
/// switch that turns on `debug` JSON blocks and `Debug-Time` headers.
pub fn is_debug_request(headers: &HeaderMap) -> bool {
    headers
        .get("Debug")
        .and_then(|value| value.to_str().ok())
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
