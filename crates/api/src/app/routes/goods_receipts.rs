use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use shopledger_purchasing::GoodsReceiptId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(receive_goods))
        .route("/:id", get(get_goods_receipt))
}

pub async fn receive_goods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateGoodsReceiptRequest>,
) -> axum::response::Response {
    let req = match body.into_new_receipt() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().receive_goods(tenant.tenant_id(), req) {
        Ok(grn) => common::created(dto::goods_receipt_to_json(&grn)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_goods_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let receipt_id: GoodsReceiptId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle().goods_receipt(tenant.tenant_id(), receipt_id) {
        Ok(grn) => common::ok(dto::goods_receipt_to_json(&grn)),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
