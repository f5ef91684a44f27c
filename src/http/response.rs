//! Response rendering for HTTP SD documents.
//!
//! # Design Decisions
//! - Documents are rendered per request from the published snapshot
//! - An encoding failure is answered with 404, same as an unknown path,
//!   so scrapers never receive a partial body

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::discovery::SdConfig;
use crate::observability::metrics;

/// 200 with the JSON array of target groups.
pub fn sd_document(groups: &[SdConfig]) -> Response {
    match serde_json::to_vec(groups) {
        Ok(body) => {
            metrics::record_request(StatusCode::OK.as_u16());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode SD document");
            not_found()
        }
    }
}

/// Empty 404.
pub fn not_found() -> Response {
    metrics::record_request(StatusCode::NOT_FOUND.as_u16());
    StatusCode::NOT_FOUND.into_response()
}
