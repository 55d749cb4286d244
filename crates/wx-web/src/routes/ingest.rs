//! Device upload endpoint.
//!
//! Stations POST form-encoded fields (some firmware uses GET with a query
//! string). Any parseable request is answered `200 OK` with body `OK`, even
//! when the configured device type is unsupported or persistence fails, so
//! devices do not fall into retry loops.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, error};

use wx_protocol::{FormError, FormPayload};

use crate::AppState;

/// Handles uploads on any path.
pub async fn ingest_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> impl IntoResponse {
    if method != Method::POST && method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    let payload = match parse_payload(&body, query.as_deref()) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("Rejected upload: {}", e);
            return (StatusCode::BAD_REQUEST, "Error parsing form data");
        }
    };

    let ingestor = state.ingestor.clone();
    match tokio::task::spawn_blocking(move || ingestor.ingest(&payload)).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            error!("Ingestion task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Decode body fields followed by query fields.
fn parse_payload(body: &[u8], query: Option<&str>) -> Result<FormPayload, FormError> {
    let body = std::str::from_utf8(body).map_err(|_| FormError::InvalidUtf8)?;
    let mut payload = FormPayload::parse(body)?;

    if let Some(query) = query {
        payload.extend(FormPayload::parse(query)?);
    }

    Ok(payload)
}
