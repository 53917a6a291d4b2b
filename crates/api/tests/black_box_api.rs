use reqwest::StatusCode;
use serde_json::{json, Value};

use shopledger_core::TenantId;
use shopledger_infra::LifecycleConfig;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = shopledger_api::app::build_app(LifecycleConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client bound to one server and one tenant.
struct Api {
    client: reqwest::Client,
    base_url: String,
    tenant: String,
}

impl Api {
    fn new(srv: &TestServer, tenant: TenantId) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: srv.base_url.clone(),
            tenant: tenant.to_string(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("x-tenant-id", &self.tenant)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("x-tenant-id", &self.tenant)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn supplier(&self, name: &str) -> String {
        let (status, body) = self.post("/suppliers", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn product(&self, sku: &str, opening_stock: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({
                    "sku": sku,
                    "name": format!("Product {sku}"),
                    "cost_price": 100,
                    "opening_stock": opening_stock,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn order(&self, supplier: &str, product: &str, qty: i64) -> Value {
        let (status, body) = self
            .post(
                "/purchase-orders",
                json!({
                    "supplier_id": supplier,
                    "lines": [{ "product_id": product, "qty_ordered": qty, "unit_cost": 100 }],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn receive(&self, supplier: &str, po: Option<&str>, product: &str, qty: i64) -> (StatusCode, Value) {
        self.post(
            "/grn",
            json!({
                "po_id": po,
                "supplier_id": supplier,
                "lines": [{ "product_id": product, "received_qty": qty, "unit_cost": 100, "batch_no": "B-1" }],
            }),
        )
        .await
    }

    async fn stock(&self, product: &str) -> i64 {
        let (status, body) = self.get(&format!("/products/{product}")).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["stock"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_is_required() {
    let srv = TestServer::spawn().await;
    let res = reqwest::Client::new()
        .get(format!("{}/suppliers", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");
}

#[tokio::test]
async fn purchase_lifecycle_end_to_end() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme Wholesale").await;
    let product = api.product("RICE-5KG", 0).await;

    // PO: draft -> confirmed.
    let po = api.order(&supplier, &product, 10).await;
    assert_eq!(po["status"], "draft");
    assert_eq!(po["po_number"], "PO-000001");
    assert_eq!(po["order_value"], 1000);
    let po_id = po["id"].as_str().unwrap().to_string();

    let (status, po) = api.post(&format!("/purchase-orders/{po_id}/confirm"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(po["status"], "confirmed");

    // Partial then full receipt.
    let (status, grn) = api.receive(&supplier, Some(&po_id), &product, 4).await;
    assert_eq!(status, StatusCode::CREATED, "{grn}");
    assert_eq!(grn["grn_number"], "GRN-000001");
    let (_, po) = api.get(&format!("/purchase-orders/{po_id}")).await;
    assert_eq!(po["status"], "partially_received");
    assert_eq!(po["lines"][0]["remaining"], 6);

    let (status, grn) = api.receive(&supplier, Some(&po_id), &product, 6).await;
    assert_eq!(status, StatusCode::CREATED, "{grn}");
    let grn_id = grn["id"].as_str().unwrap().to_string();
    let (_, po) = api.get(&format!("/purchase-orders/{po_id}")).await;
    assert_eq!(po["status"], "complete");
    assert_eq!(api.stock(&product).await, 10);

    let (status, body) = api.receive(&supplier, Some(&po_id), &product, 1).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "already_complete");

    // Bill: 10 x 100 + 10% tax = 1100, 500 paid up front.
    let (status, bill) = api
        .post(
            "/purchases",
            json!({
                "supplier_id": supplier,
                "grn_id": grn_id,
                "items": [{ "product_id": product, "quantity": 10, "rate": 100, "tax": 10 }],
                "paid_amount": 500,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{bill}");
    assert_eq!(bill["totals"]["subtotal"], 1000);
    assert_eq!(bill["totals"]["tax_total"], 100);
    assert_eq!(bill["totals"]["total_amount"], 1100);
    assert_eq!(bill["due_amount"], 600);
    assert_eq!(bill["payment_status"], "partially_paid");
    let bill_id = bill["id"].as_str().unwrap().to_string();

    let (status, body) = api
        .post(&format!("/purchases/{bill_id}/payments"), json!({ "amount": 700 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "over_payment");
    assert_eq!(body["requested"], 700);
    assert_eq!(body["allowed"], 600);

    let (status, bill) = api
        .post(&format!("/purchases/{bill_id}/payments"), json!({ "amount": 600 }))
        .await;
    assert_eq!(status, StatusCode::OK, "{bill}");
    assert_eq!(bill["due_amount"], 0);
    assert_eq!(bill["payment_status"], "paid");

    // Return on a fully paid bill leaves a credit balance.
    let (status, ret) = api
        .post(
            "/purchase-returns",
            json!({
                "supplier_id": supplier,
                "purchase_id": bill_id,
                "items": [{ "product_id": product, "quantity": 2, "rate": 100, "tax": 10 }],
                "reason": "damaged",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{ret}");
    assert_eq!(ret["totals"]["total_amount"], 220);
    assert_eq!(ret["return_no"], "DN-000001");

    let (_, bill) = api.get(&format!("/purchases/{bill_id}")).await;
    assert_eq!(bill["paid_amount"], 1100);
    assert_eq!(bill["returned_amount"], 220);
    assert_eq!(bill["due_amount"], -220);
    assert_eq!(bill["credit_balance"], 220);
    assert_eq!(bill["payment_status"], "credit_balance");
    assert_eq!(api.stock(&product).await, 8);
}

#[tokio::test]
async fn over_receipt_is_rejected_with_magnitudes() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme").await;
    let product = api.product("OIL-1L", 0).await;
    let po = api.order(&supplier, &product, 5).await;
    let po_id = po["id"].as_str().unwrap();

    let (status, body) = api.receive(&supplier, Some(po_id), &product, 6).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "over_receipt");
    assert_eq!(body["requested"], 6);
    assert_eq!(body["remaining"], 5);

    assert_eq!(api.stock(&product).await, 0);
    let (_, po) = api.get(&format!("/purchase-orders/{po_id}")).await;
    assert_eq!(po["lines"][0]["qty_received"], 0);
}

#[tokio::test]
async fn invalid_transitions_conflict() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme").await;
    let product = api.product("SUGAR", 0).await;
    let po = api.order(&supplier, &product, 3).await;
    let po_id = po["id"].as_str().unwrap();

    let (status, _) = api.post(&format!("/purchase-orders/{po_id}/confirm"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = api.post(&format!("/purchase-orders/{po_id}/confirm"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    // Lines of a confirmed order are frozen.
    let (status, _) = api
        .post(
            &format!("/purchase-orders/{po_id}/lines"),
            json!({ "lines": [{ "product_id": product, "qty_ordered": 9, "unit_cost": 100 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, po) = api
        .post(&format!("/purchase-orders/{po_id}/cancel"), json!({ "reason": "supplier out of stock" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(po["status"], "cancelled");
    assert_eq!(po["cancel_reason"], "supplier out of stock");

    let (status, body) = api.receive(&supplier, Some(po_id), &product, 1).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn return_beyond_stock_is_rejected() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme").await;
    let product = api.product("FLOUR", 0).await;

    let (status, _) = api.receive(&supplier, None, &product, 3).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = api
        .post(
            "/purchase-returns",
            json!({
                "supplier_id": supplier,
                "items": [{ "product_id": product, "quantity": 4, "rate": 100, "tax": 0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["requested"], 4);
    assert_eq!(body["available"], 3);
    assert_eq!(api.stock(&product).await, 3);
}

#[tokio::test]
async fn request_errors_map_to_client_statuses() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme").await;
    let product = api.product("SALT", 0).await;

    // Missing numeric field is never defaulted.
    let (status, body) = api
        .post(
            "/purchases",
            json!({
                "supplier_id": supplier,
                "items": [{ "product_id": product, "quantity": 1, "rate": 100, "tax": 0 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = api.get("/purchase-orders/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let missing = shopledger_core::AggregateId::new();
    let (status, body) = api.get(&format!("/purchases/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = api.receive(&missing.to_string(), None, &product, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Reusing a caller-supplied document number conflicts.
    let (status, _) = api
        .post(
            "/grn",
            json!({
                "grn_number": "GRN-A",
                "supplier_id": supplier,
                "lines": [{ "product_id": product, "received_qty": 1, "unit_cost": 100 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = api
        .post(
            "/grn",
            json!({
                "grn_number": "GRN-A",
                "supplier_id": supplier,
                "lines": [{ "product_id": product, "received_qty": 1, "unit_cost": 100 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn resubmitted_receipt_is_applied_once() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme").await;
    let product = api.product("TEA", 0).await;
    let receipt_id = shopledger_core::AggregateId::new().to_string();

    let body = json!({
        "id": receipt_id,
        "supplier_id": supplier,
        "lines": [{ "product_id": product, "received_qty": 5, "unit_cost": 100 }],
    });
    let (first, a) = api.post("/grn", body.clone()).await;
    let (second, b) = api.post("/grn", body).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CREATED);
    assert_eq!(a["grn_number"], b["grn_number"]);
    assert_eq!(api.stock(&product).await, 5);
}

#[tokio::test]
async fn bill_lines_are_editable_until_first_payment() {
    let srv = TestServer::spawn().await;
    let api = Api::new(&srv, TenantId::new());
    let supplier = api.supplier("Acme").await;
    let product = api.product("FLOUR", 0).await;

    let (status, bill) = api
        .post(
            "/purchases",
            json!({
                "supplier_id": supplier,
                "items": [{ "product_id": product, "quantity": 4, "rate": 100, "tax": 0 }],
                "paid_amount": 0,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{bill}");
    let bill_id = bill["id"].as_str().unwrap().to_string();

    let items = json!({
        "items": [{ "product_id": product, "quantity": 5, "rate": 100, "tax": 10 }],
    });
    let (status, bill) = api.post(&format!("/purchases/{bill_id}/lines"), items.clone()).await;
    assert_eq!(status, StatusCode::OK, "{bill}");
    assert_eq!(bill["totals"]["total_amount"], 550);
    assert_eq!(bill["due_amount"], 550);

    let (status, _) = api
        .post(&format!("/purchases/{bill_id}/payments"), json!({ "amount": 50 }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = api.post(&format!("/purchases/{bill_id}/lines"), items).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let srv = TestServer::spawn().await;
    let shop_a = Api::new(&srv, TenantId::new());
    let shop_b = Api::new(&srv, TenantId::new());

    let product = shop_a.product("COFFEE", 7).await;
    assert_eq!(shop_a.stock(&product).await, 7);

    let (status, _) = shop_b.get(&format!("/products/{product}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    shop_a.supplier("Acme").await;
    let (_, listed) = shop_b.get("/suppliers").await;
    assert_eq!(listed["items"], json!([]));
}
