//! `HEAD`/`GET /<debug_file>/<debug_id>/<symbol_filename>`: the raw download
//! facade that exposes the fetcher (component C) directly, honouring the
//! ignore list and recording misses on `GET` (component G).

use std::str::FromStr;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use debugid::DebugId;
use serde::Deserialize;
use symserv_core::{is_ignored_download, DownloadKey, Presence};

use super::is_debug_request;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct DownloadQuery {
    #[serde(default)]
    pub code_file: String,
    #[serde(default)]
    pub code_id: String,
}

pub async fn head(
    State(state): State<AppState>,
    Path((debug_file, debug_id, symbol_filename)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if is_ignored_download(&symbol_filename, &debug_id) {
        return with_debug_time(StatusCode::NOT_FOUND.into_response(), &headers, Duration::ZERO);
    }
    let Some(key) = parse_key(&debug_file, &debug_id, &symbol_filename) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (presence, elapsed) = state.0.fetcher.head(&key).await;
    let status = match presence {
        Presence::Present { .. } => StatusCode::OK,
        Presence::Absent => StatusCode::NOT_FOUND,
    };
    with_debug_time(status.into_response(), &headers, elapsed)
}

pub async fn get(
    State(state): State<AppState>,
    Path((debug_file, debug_id, symbol_filename)): Path<(String, String, String)>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Response {
    if is_ignored_download(&symbol_filename, &debug_id) {
        return with_debug_time(StatusCode::NOT_FOUND.into_response(), &headers, Duration::ZERO);
    }
    let Some(key) = parse_key(&debug_file, &debug_id, &symbol_filename) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let (url, elapsed) = state.0.fetcher.url(&key).await;
    match url {
        Some(url) => with_debug_time(Redirect::to(&url).into_response(), &headers, elapsed),
        None => {
            let today = Utc::now().date_naive().to_string();
            state.0.missing_log.record(
                &today,
                &debug_file,
                &debug_id,
                &symbol_filename,
                &query.code_file,
                &query.code_id,
            );
            with_debug_time(StatusCode::NOT_FOUND.into_response(), &headers, elapsed)
        }
    }
}

fn parse_key(debug_file: &str, debug_id: &str, symbol_filename: &str) -> Option<DownloadKey> {
    let id = DebugId::from_str(debug_id)
        .or_else(|_| DebugId::from_breakpad(debug_id))
        .ok()?;
    Some(DownloadKey::new(debug_file, id, symbol_filename))
}

fn with_debug_time(mut response: Response, headers: &HeaderMap, elapsed: Duration) -> Response {
    if is_debug_request(headers) {
        if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
            response.headers_mut().insert("Debug-Time", value);
        }
    }
    response
}
