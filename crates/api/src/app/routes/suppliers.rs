use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};

use shopledger_infra::SupplierDirectory;
use shopledger_purchasing::SupplierId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_supplier).get(list_suppliers))
        .route("/:id", get(get_supplier))
}

pub async fn register_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateSupplierRequest>,
) -> axum::response::Response {
    let new = match body.into_new_supplier() {
        Ok(n) => n,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.lifecycle().suppliers().register(tenant.tenant_id(), new) {
        Ok(supplier) => {
            tracing::info!(tenant = %tenant.tenant_id(), supplier = %supplier.supplier_id, "supplier registered");
            common::created(dto::supplier_to_json(&supplier))
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .lifecycle()
        .suppliers()
        .list(tenant.tenant_id())
        .iter()
        .map(dto::supplier_to_json)
        .collect::<Vec<_>>();
    common::ok(serde_json::json!({ "items": items }))
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let supplier_id: SupplierId = match common::path_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.lifecycle().suppliers().get(tenant.tenant_id(), supplier_id) {
        Some(s) => common::ok(dto::supplier_to_json(&s)),
        None => errors::json_error(
            axum::http::StatusCode::NOT_FOUND,
            "not_found",
            format!("supplier {supplier_id}"),
        ),
    }
}
