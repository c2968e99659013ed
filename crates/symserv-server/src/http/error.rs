//! Maps engine/request decode errors onto HTTP status codes and a small
//! JSON error body, keeping `symserv_core::SymbolError` and
//! `symserv_engine::RequestError` out of the HTTP layer's vocabulary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })).into_response()
            }
        }
    }
}
