use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use shopledger_purchasing::PurchaseOrderId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/lines", post(amend_purchase_order))
        .route("/:id/confirm", post(confirm_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    let req = match body.into_new_order() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().create_purchase_order(tenant.tenant_id(), req) {
        Ok(po) => common::created(dto::purchase_order_to_json(&po)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle().purchase_order(tenant.tenant_id(), order_id) {
        Ok(po) => common::ok(dto::purchase_order_to_json(&po)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn amend_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AmendPurchaseOrderRequest>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let lines = match body.into_lines() {
        Ok(l) => l,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .lifecycle()
        .amend_purchase_order(tenant.tenant_id(), order_id, lines)
    {
        Ok(po) => common::ok(dto::purchase_order_to_json(&po)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn confirm_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .lifecycle()
        .confirm_purchase_order(tenant.tenant_id(), order_id)
    {
        Ok(po) => common::ok(dto::purchase_order_to_json(&po)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// The body (`{ "reason": ... }`) is optional.
pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::CancelPurchaseOrderRequest>>,
) -> axum::response::Response {
    let order_id: PurchaseOrderId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let reason = body.map(|Json(b)| b).unwrap_or_default().reason;

    match services
        .lifecycle()
        .cancel_purchase_order(tenant.tenant_id(), order_id, reason)
    {
        Ok(po) => common::ok(dto::purchase_order_to_json(&po)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
