//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: engine wiring (event store, bus, numbering, suppliers)
//! - `routes/`: HTTP routes + handlers (one file per document type)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use shopledger_infra::LifecycleConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(engine: LifecycleConfig) -> Router {
    let services = Arc::new(services::build_services(engine));

    // Tenant-scoped routes: require the tenant header.
    let scoped = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(scoped)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn health_needs_no_tenant() {
        let res = build_app(LifecycleConfig::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn scoped_routes_reject_missing_or_malformed_tenant() {
        let app = build_app(LifecycleConfig::default());

        let res = app
            .clone()
            .oneshot(Request::get("/suppliers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .oneshot(
                Request::get("/suppliers")
                    .header(middleware::TENANT_HEADER, "shop-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
