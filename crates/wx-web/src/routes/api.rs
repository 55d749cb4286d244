//! JSON query API.
//!
//! # Endpoints
//!
//! ### `GET /api/current`
//! The latest ingested reading, or `404` before the first upload.
//!
//! ### `GET /api/history?start=<RFC3339>&end=<RFC3339>`
//! Stored readings with `start <= timestamp < end`, oldest first. Missing or
//! unparseable bounds fall back to the last 24 hours.
//!
//! ### `GET /api/station`
//! Configured station metadata.
//!
//! ### `GET /api/publishers`
//! Status and counters of each configured publisher.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::error;

use wx_core::{Reading, Station, StoreError};
use wx_server::PublisherStatus;

use crate::AppState;

/// Query parameters for `/api/history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl HistoryParams {
    /// Resolve the `[start, end)` window relative to `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = parse_time(self.end.as_deref()).unwrap_or(now);
        let start = parse_time(self.start.as_deref()).unwrap_or(now - Duration::hours(24));
        (start, end)
    }
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .filter(|v| !v.is_empty())
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Create API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/current", get(current))
        .route("/history", get(history))
        .route("/station", get(station))
        .route("/publishers", get(publishers))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// GET /api/current
async fn current(State(state): State<AppState>) -> Response {
    match state.cache.get() {
        Some(reading) => Json(reading).into_response(),
        None => error_response(StatusCode::NOT_FOUND, &StoreError::Empty.to_string()),
    }
}

/// GET /api/history
async fn history(State(state): State<AppState>, Query(params): Query<HistoryParams>) -> Response {
    let (start, end) = params.window(Utc::now());
    let store = state.store.clone();

    let result = tokio::task::spawn_blocking(move || store.range(start, end)).await;

    match result {
        Ok(Ok(readings)) => Json::<Vec<Reading>>(readings).into_response(),
        Ok(Err(e)) => {
            error!("Error retrieving historical data: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error retrieving historical data",
            )
        }
        Err(e) => {
            error!("History query task failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error retrieving historical data",
            )
        }
    }
}

/// GET /api/station
async fn station(State(state): State<AppState>) -> Json<Station> {
    Json(state.station.clone())
}

/// GET /api/publishers
async fn publishers(State(state): State<AppState>) -> Json<Vec<PublisherStatus>> {
    Json(state.publishers.iter().map(|p| p.snapshot()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_window_defaults_to_last_day() {
        let (start, end) = HistoryParams::default().window(now());
        assert_eq!(end, now());
        assert_eq!(start, now() - Duration::hours(24));
    }

    #[test]
    fn test_window_parses_rfc3339() {
        let params = HistoryParams {
            start: Some("2024-01-16T00:00:00Z".to_string()),
            end: Some("2024-01-16T06:00:00+02:00".to_string()),
        };
        let (start, end) = params.window(now());

        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 16, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_window_invalid_falls_back() {
        let params = HistoryParams {
            start: Some("yesterday".to_string()),
            end: Some(String::new()),
        };
        let (start, end) = params.window(now());

        assert_eq!(end, now());
        assert_eq!(start, now() - Duration::hours(24));
    }
}
