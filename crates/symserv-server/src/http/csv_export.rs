//! `GET /missingsymbols.csv`: a streaming-in-spirit CSV scan over the
//! missing-log's key space for one day.

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct CsvQuery {
    #[serde(default)]
    pub today: Option<String>,
}

pub async fn handle(State(state): State<AppState>, Query(query): Query<CsvQuery>) -> Response {
    let today = query.today.as_deref() == Some("1");
    let date = if today {
        Utc::now().date_naive()
    } else {
        Utc::now().date_naive() - ChronoDuration::days(1)
    };
    let date_string = date.to_string();

    let rows = state.0.missing_log.rows_for_date(&date_string);

    let mut writer = csv::Writer::from_writer(Vec::new());
    if writer
        .write_record(["debug_file", "debug_id", "code_file", "code_id"])
        .is_err()
    {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    for row in &rows {
        if writer
            .write_record([&row.debug_file, &row.debug_id, &row.code_file, &row.code_id])
            .is_err()
        {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    let body = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    if let Ok(value) = HeaderValue::from_str(&format!(
        "attachment; filename=\"missing-symbols-{date_string}.csv\""
    )) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    response
}
