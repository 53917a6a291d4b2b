use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shopledger_accounting::Money;
use shopledger_core::DomainError;
use shopledger_infra::DispatchError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::TenantIsolation(msg) => {
            json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg)
        }
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Business-rule violations answer 422 and carry the attempted and allowed
/// magnitudes next to the message.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InvalidTransition { from, action } => json_body(
            StatusCode::CONFLICT,
            json!({
                "error": "invalid_transition",
                "message": message,
                "from": from,
                "action": action,
            }),
        ),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::OverReceipt {
            product,
            requested,
            remaining,
        } => json_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": "over_receipt",
                "message": message,
                "product_id": product,
                "requested": requested,
                "remaining": remaining,
            }),
        ),
        DomainError::OverPayment { requested, allowed } => json_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": "over_payment",
                "message": message,
                "requested": Money::new(requested).to_minor_units(),
                "allowed": Money::new(allowed).to_minor_units(),
            }),
        ),
        DomainError::InsufficientStock {
            product,
            requested,
            available,
        } => json_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": "insufficient_stock",
                "message": message,
                "product_id": product,
                "requested": requested,
                "available": available,
            }),
        ),
        DomainError::AlreadyComplete(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "already_complete", message)
        }
        DomainError::InvalidState(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_state", message)
        }
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    json_body(
        status,
        json!({
            "error": code,
            "message": message.into(),
        }),
    )
}

fn json_body(status: StatusCode, body: serde_json::Value) -> axum::response::Response {
    (status, axum::Json(body)).into_response()
}
