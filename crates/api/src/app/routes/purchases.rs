use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use shopledger_payables::PurchaseBillId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_bill))
        .route("/:id", get(get_bill))
        .route("/:id/lines", post(revise_bill))
        .route("/:id/payments", post(record_payment))
}

pub async fn create_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateBillRequest>,
) -> axum::response::Response {
    let req = match body.into_new_bill() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().create_bill(tenant.tenant_id(), req) {
        Ok(bill) => common::created(dto::bill_to_json(&bill)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let bill_id: PurchaseBillId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle().bill(tenant.tenant_id(), bill_id) {
        Ok(bill) => common::ok(dto::bill_to_json(&bill)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn revise_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReviseBillRequest>,
) -> axum::response::Response {
    let bill_id: PurchaseBillId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let lines = match body.into_lines() {
        Ok(l) => l,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().revise_bill(tenant.tenant_id(), bill_id, lines) {
        Ok(bill) => common::ok(dto::bill_to_json(&bill)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let bill_id: PurchaseBillId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let payment = match body.into_new_payment() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .lifecycle()
        .record_payment(tenant.tenant_id(), bill_id, payment)
    {
        Ok(bill) => common::ok(dto::bill_to_json(&bill)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
