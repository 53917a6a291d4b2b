use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use shopledger_payables::PurchaseReturnId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_return))
        .route("/:id", get(get_return))
}

pub async fn create_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreatePurchaseReturnRequest>,
) -> axum::response::Response {
    let req = match body.into_new_return() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().create_return(tenant.tenant_id(), req) {
        Ok(ret) => common::created(dto::purchase_return_to_json(&ret)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let return_id: PurchaseReturnId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle().purchase_return(tenant.tenant_id(), return_id) {
        Ok(ret) => common::ok(dto::purchase_return_to_json(&ret)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
