use axum::Router;

pub mod common;
pub mod goods_receipts;
pub mod products;
pub mod purchase_orders;
pub mod purchase_returns;
pub mod purchases;
pub mod suppliers;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/suppliers", suppliers::router())
        .nest("/products", products::router())
        .nest("/purchase-orders", purchase_orders::router())
        .nest("/grn", goods_receipts::router())
        .nest("/purchases", purchases::router())
        .nest("/purchase-returns", purchase_returns::router())
}
