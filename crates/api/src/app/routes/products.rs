use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use shopledger_inventory::ProductId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product))
        .route("/:id", get(get_product))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let req = match body.into_new_product() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().register_product(tenant.tenant_id(), req) {
        Ok(product) => match dto::product_to_json(&product) {
            Ok(json) => common::created(json),
            Err(e) => errors::domain_error_to_response(e),
        },
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle().product(tenant.tenant_id(), product_id) {
        Ok(product) => match dto::product_to_json(&product) {
            Ok(json) => common::ok(json),
            Err(e) => errors::domain_error_to_response(e),
        },
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
