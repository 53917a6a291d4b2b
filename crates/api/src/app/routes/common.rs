use core::str::FromStr;

use axum::{http::StatusCode, response::IntoResponse, Json};

use shopledger_core::DomainError;

use crate::app::{dto, errors};

/// Parse a document id taken from the URL path.
pub fn path_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    dto::parse_id(raw).map_err(errors::domain_error_to_response)
}

pub fn created(body: serde_json::Value) -> axum::response::Response {
    (StatusCode::CREATED, Json(body)).into_response()
}

pub fn ok(body: serde_json::Value) -> axum::response::Response {
    (StatusCode::OK, Json(body)).into_response()
}
