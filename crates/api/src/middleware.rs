use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use shopledger_core::TenantId;

use crate::app::errors;
use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant from the `x-tenant-id` header into a [`TenantContext`]
/// request extension.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let tenant_id = extract_tenant(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, Response> {
    let header = headers.get(TENANT_HEADER).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "missing_tenant",
            format!("{TENANT_HEADER} header is required"),
        )
    })?;

    let raw = header.to_str().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_tenant",
            format!("{TENANT_HEADER} must be ASCII"),
        )
    })?;

    raw.trim()
        .parse::<TenantId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_tenant", e.to_string()))
}
