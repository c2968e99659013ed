//! `POST /symbolicate/v4` and `POST /`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use symserv_engine::{decode, SymbolicationRequest, SymbolicationResponse};

use super::is_debug_request;
use crate::http::error::ApiError;
use crate::state::AppState;

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SymbolicationResponse>, ApiError> {
    let raw: SymbolicationRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::InvalidRequest(format!("invalid JSON body: {err}")))?;
    let decoded = decode(raw).map_err(|err| ApiError::InvalidRequest(err.to_string()))?;

    let debug = is_debug_request(&headers);
    let response = state
        .0
        .engine
        .symbolicate(decoded.modules, decoded.stacks, debug)
        .await;
    Ok(Json(response))
}
