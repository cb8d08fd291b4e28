//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use ops::{InMemoryCatalog, InMemoryDirectory};
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestContext {
    app: axum::Router,
    catalog: Arc<InMemoryCatalog>,
    directory: Arc<InMemoryDirectory>,
}

/// Fresh app over an empty store, with two products in the catalog.
fn setup() -> TestContext {
    let store = Arc::new(InMemoryStore::new());
    let (state, catalog, directory) = api::create_default_state(store);
    catalog.put_product("cola-330ml", "Cola 330ml", Money::from_minor(250));
    catalog.put_product("choc-bar", "Chocolate Bar", Money::from_minor(180));

    let app = api::create_app(state, get_metrics_handle());
    TestContext {
        app,
        catalog,
        directory,
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn post(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Creates an order for 2 colas + 1 bar and pays it through the webhook.
/// Returns the order id; the order total is 680 under `payment_ref`.
async fn paid_order(app: &axum::Router, payment_ref: &str) -> String {
    let (status, order) = post_json(
        app,
        "/orders",
        json!({
            "items": [
                { "product_id": "cola-330ml", "quantity": 2 },
                { "product_id": "choc-bar", "quantity": 1 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, _) = post_json(
        app,
        &format!("/orders/{order_id}/payment"),
        json!({ "payment_ref": payment_ref }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, ack) = post_json(
        app,
        "/webhooks/payments",
        json!({
            "event_type": "payment_succeeded",
            "order_ref": order_id,
            "payment_ref": payment_ref,
            "amount": 680,
            "currency": "eur"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "activated");

    order_id
}

#[tokio::test]
async fn test_health_check() {
    let ctx = setup();

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let ctx = setup();

    let response = ctx
        .app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_create_order() {
    let ctx = setup();

    let (status, order) = post_json(
        &ctx.app,
        "/orders",
        json!({
            "items": [
                { "product_id": "cola-330ml", "quantity": 2 },
                { "product_id": "choc-bar", "quantity": 1 }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["state"], "Pending");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["items"][0]["unit_price"], 250);
    assert_eq!(order["items"][0]["label"], "Cola 330ml");
    assert_eq!(order["amount_total"], Value::Null);
    assert_eq!(order["refunded_total"], 0);
}

#[tokio::test]
async fn test_create_order_unknown_product() {
    let ctx = setup();

    let (status, body) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "no-such-sku", "quantity": 1 }] }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("no-such-sku"));
}

#[tokio::test]
async fn test_create_order_rejects_bad_lines() {
    let ctx = setup();

    let (status, _) = post_json(&ctx.app, "/orders", json!({ "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "cola-330ml", "quantity": 0 }] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_order_roundtrip() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "cola-330ml", "quantity": 1 }] }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], order_id);
    assert_eq!(order["state"], "Pending");
    assert_eq!(order["items"][0]["product_id"], "cola-330ml");
}

#[tokio::test]
async fn test_get_order_errors() {
    let ctx = setup();

    let (status, _) = get(&ctx.app, "/orders/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, _) = get(&ctx.app, &format!("/orders/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders() {
    let ctx = setup();

    for _ in 0..2 {
        let (status, _) = post_json(
            &ctx.app,
            "/orders",
            json!({ "items": [{ "product_id": "choc-bar", "quantity": 1 }] }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, orders) = get(&ctx.app, "/orders").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_payment_flow_activates_order() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({
            "items": [
                { "product_id": "cola-330ml", "quantity": 2 },
                { "product_id": "choc-bar", "quantity": 1 }
            ]
        }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = post_json(
        &ctx.app,
        &format!("/orders/{order_id}/payment"),
        json!({ "payment_ref": "pi_100" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["state"], "RequiresPayment");
    assert_eq!(order["payment_ref"], "pi_100");

    let (status, ack) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "payment_succeeded",
            "order_ref": order_id,
            "payment_ref": "pi_100",
            "amount": 680,
            "currency": "eur"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "activated");

    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["state"], "Active");
    assert_eq!(order["amount_total"], 680);
    assert_eq!(order["currency"], "eur");
}

#[tokio::test]
async fn test_webhook_duplicate_payment_event() {
    let ctx = setup();
    let order_id = paid_order(&ctx.app, "pi_dup").await;

    let (status, ack) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "payment_succeeded",
            "order_ref": order_id,
            "payment_ref": "pi_dup",
            "amount": 680,
            "currency": "eur"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "already_applied");

    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["state"], "Active");
}

#[tokio::test]
async fn test_webhook_payment_for_cancelled_order_conflicts() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "cola-330ml", "quantity": 1 }] }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = post(&ctx.app, &format!("/orders/{order_id}/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["state"], "Cancelled");

    let (status, _) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "payment_succeeded",
            "order_ref": order_id,
            "payment_ref": "pi_late",
            "amount": 250,
            "currency": "eur"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_expire_order() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "choc-bar", "quantity": 1 }] }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = post(&ctx.app, &format!("/orders/{order_id}/expire")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["state"], "Expired");
}

#[tokio::test]
async fn test_refund_flow() {
    let ctx = setup();
    let order_id = paid_order(&ctx.app, "pi_refund").await;

    let (status, ack) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "refund_updated",
            "payment_ref": "pi_refund",
            "refund_id": "re_1",
            "refunded_amount": 200
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "refund_recorded");

    // Cumulative update of the same refund completes the ledger.
    let (status, ack) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "refund_updated",
            "payment_ref": "pi_refund",
            "refund_id": "re_1",
            "refunded_amount": 680
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "refunded");

    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["state"], "Refunded");
    assert_eq!(order["refunded_total"], 680);
}

#[tokio::test]
async fn test_refund_before_payment_conflicts() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "cola-330ml", "quantity": 1 }] }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    let (status, _) = post_json(
        &ctx.app,
        &format!("/orders/{order_id}/payment"),
        json!({ "payment_ref": "pi_early" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "refund_updated",
            "payment_ref": "pi_early",
            "refund_id": "re_1",
            "refunded_amount": 100
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("no captured payment"));
}

#[tokio::test]
async fn test_refund_for_unknown_payment_ref() {
    let ctx = setup();

    let (status, _) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "refund_updated",
            "payment_ref": "pi_nobody",
            "refund_id": "re_1",
            "refunded_amount": 100
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refund_exceeding_total_rejected() {
    let ctx = setup();
    let order_id = paid_order(&ctx.app, "pi_over").await;

    let (status, _) = post_json(
        &ctx.app,
        "/webhooks/payments",
        json!({
            "event_type": "refund_updated",
            "payment_ref": "pi_over",
            "refund_id": "re_big",
            "refunded_amount": 9999
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["state"], "Active");
    assert_eq!(order["refunded_total"], 0);
}

#[tokio::test]
async fn test_pickup_flow() {
    let ctx = setup();
    let order_id = paid_order(&ctx.app, "pi_pickup").await;
    let machine_id = uuid::Uuid::new_v4();

    let (status, pickup) = post_json(
        &ctx.app,
        "/pickups",
        json!({ "order_id": order_id, "machine_id": machine_id.to_string() }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pickup["state"], "Pending");
    let pickup_id = pickup["id"].as_str().unwrap();

    let (status, pickup) = post(&ctx.app, &format!("/pickups/{pickup_id}/complete")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pickup["state"], "Completed");
    assert!(pickup["picked_up_at"].as_str().is_some());

    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["state"], "Used");

    let (_, pickups) = get(&ctx.app, &format!("/orders/{order_id}/pickups")).await;
    assert_eq!(pickups.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_pickup_for_unpaid_order_conflicts() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "cola-330ml", "quantity": 1 }] }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();
    let machine_id = uuid::Uuid::new_v4();

    let (status, _) = post_json(
        &ctx.app,
        "/pickups",
        json!({ "order_id": order_id, "machine_id": machine_id.to_string() }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_second_pending_pickup_conflicts() {
    let ctx = setup();
    let order_id = paid_order(&ctx.app, "pi_twice").await;
    let machine_id = uuid::Uuid::new_v4();

    let body = json!({ "order_id": order_id, "machine_id": machine_id.to_string() });
    let (status, _) = post_json(&ctx.app, "/pickups", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_json(&ctx.app, "/pickups", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_failed_pickup_then_retry() {
    let ctx = setup();
    let order_id = paid_order(&ctx.app, "pi_retry").await;
    let machine_id = uuid::Uuid::new_v4();

    let body = json!({ "order_id": order_id, "machine_id": machine_id.to_string() });
    let (_, pickup) = post_json(&ctx.app, "/pickups", body.clone()).await;
    let first_id = pickup["id"].as_str().unwrap().to_string();

    let (status, pickup) = post(&ctx.app, &format!("/pickups/{first_id}/fail")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pickup["state"], "Failed");

    // The order is still collectable, so a second attempt goes through.
    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["state"], "Active");

    let (status, pickup) = post_json(&ctx.app, "/pickups", body).await;
    assert_eq!(status, StatusCode::CREATED);
    let second_id = pickup["id"].as_str().unwrap().to_string();

    let (status, _) = post(&ctx.app, &format!("/pickups/{second_id}/complete")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, pickups) = get(&ctx.app, &format!("/orders/{order_id}/pickups")).await;
    let states: Vec<&str> = pickups
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["state"].as_str().unwrap())
        .collect();
    assert_eq!(states, vec!["Failed", "Completed"]);
}

#[tokio::test]
async fn test_configure_slot_and_list() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();

    let (status, stock) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 2,
            "product_id": "choc-bar",
            "max_capacity": 6,
            "low_threshold": 2
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stock["quantity"], 0);
    assert_eq!(stock["machine_id"], machine_id.to_string());

    let (status, _) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 1,
            "product_id": "cola-330ml",
            "max_capacity": 10,
            "low_threshold": 3
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stock) = get(&ctx.app, &format!("/machines/{machine_id}/stock")).await;
    assert_eq!(status, StatusCode::OK);
    let slots = stock.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["slot_number"], 1);
    assert_eq!(slots[1]["slot_number"], 2);
}

#[tokio::test]
async fn test_configure_slot_errors() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();
    let body = json!({
        "slot_number": 1,
        "product_id": "cola-330ml",
        "max_capacity": 10,
        "low_threshold": 3
    });

    let uri = format!("/machines/{machine_id}/slots");
    let (status, _) = post_json(&ctx.app, &uri, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    // Same slot again.
    let (status, _) = post_json(&ctx.app, &uri, body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 2,
            "product_id": "cola-330ml",
            "max_capacity": 0,
            "low_threshold": 0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_apply_delta_moves_quantity() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();

    let (_, stock) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 1,
            "product_id": "cola-330ml",
            "max_capacity": 10,
            "low_threshold": 3
        }),
    )
    .await;
    let stock_id = stock["id"].as_str().unwrap();

    let (status, stock) = post_json(
        &ctx.app,
        &format!("/stock/{stock_id}/delta"),
        json!({ "delta": 6 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["quantity"], 6);

    let (status, stock) = post_json(
        &ctx.app,
        &format!("/stock/{stock_id}/delta"),
        json!({ "delta": -2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["quantity"], 4);
}

#[tokio::test]
async fn test_apply_delta_bounds_conflict() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();

    let (_, stock) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 1,
            "product_id": "cola-330ml",
            "max_capacity": 10,
            "low_threshold": 3
        }),
    )
    .await;
    let stock_id = stock["id"].as_str().unwrap();

    let (status, _) = post_json(
        &ctx.app,
        &format!("/stock/{stock_id}/delta"),
        json!({ "delta": -1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(
        &ctx.app,
        &format!("/stock/{stock_id}/delta"),
        json!({ "delta": 11 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_restock_batch() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();
    let user_id = uuid::Uuid::new_v4();

    let mut stock_ids = Vec::new();
    for (slot, capacity) in [(1, 10), (2, 6)] {
        let (_, stock) = post_json(
            &ctx.app,
            &format!("/machines/{machine_id}/slots"),
            json!({
                "slot_number": slot,
                "product_id": "cola-330ml",
                "max_capacity": capacity,
                "low_threshold": 2
            }),
        )
        .await;
        stock_ids.push(stock["id"].as_str().unwrap().to_string());
    }

    let (status, restock) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/restocks"),
        json!({
            "user_id": user_id.to_string(),
            "notes": "weekly round",
            "lines": [
                { "stock_id": stock_ids[0], "quantity_to_add": 4 },
                { "stock_id": stock_ids[1], "quantity_to_add": 6 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(restock["total_added"], 10);
    assert_eq!(restock["items"].as_array().unwrap().len(), 2);
    assert_eq!(restock["notes"], "weekly round");
    let restock_id = restock["id"].as_str().unwrap();

    let (_, stock) = get(&ctx.app, &format!("/machines/{machine_id}/stock")).await;
    assert_eq!(stock[0]["quantity"], 4);
    assert_eq!(stock[1]["quantity"], 6);

    let (status, fetched) = get(&ctx.app, &format!("/restocks/{restock_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], restock_id);

    let (_, history) = get(&ctx.app, &format!("/machines/{machine_id}/restocks")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_restock_over_capacity_is_atomic() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();
    let user_id = uuid::Uuid::new_v4();

    let mut stock_ids = Vec::new();
    for slot in [1, 2] {
        let (_, stock) = post_json(
            &ctx.app,
            &format!("/machines/{machine_id}/slots"),
            json!({
                "slot_number": slot,
                "product_id": "choc-bar",
                "max_capacity": 6,
                "low_threshold": 2
            }),
        )
        .await;
        stock_ids.push(stock["id"].as_str().unwrap().to_string());
    }

    let (status, _) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/restocks"),
        json!({
            "user_id": user_id.to_string(),
            "lines": [
                { "stock_id": stock_ids[0], "quantity_to_add": 5 },
                { "stock_id": stock_ids[1], "quantity_to_add": 7 }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Nothing from the batch stuck, including the valid first line.
    let (_, stock) = get(&ctx.app, &format!("/machines/{machine_id}/stock")).await;
    assert_eq!(stock[0]["quantity"], 0);
    assert_eq!(stock[1]["quantity"], 0);

    let (_, history) = get(&ctx.app, &format!("/machines/{machine_id}/restocks")).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_restock_to_max_uses_directory_admin() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();
    let admin = UserId::new();
    ctx.directory.set_admin(admin);

    for (slot, capacity) in [(1, 10), (2, 6)] {
        post_json(
            &ctx.app,
            &format!("/machines/{machine_id}/slots"),
            json!({
                "slot_number": slot,
                "product_id": "cola-330ml",
                "max_capacity": capacity,
                "low_threshold": 2
            }),
        )
        .await;
    }

    let (status, restock) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/restocks/max"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(restock["user_id"], admin.to_string());
    assert_eq!(restock["total_added"], 16);

    let (_, stock) = get(&ctx.app, &format!("/machines/{machine_id}/stock")).await;
    assert_eq!(stock[0]["quantity"], 10);
    assert_eq!(stock[1]["quantity"], 6);
}

#[tokio::test]
async fn test_restock_to_max_without_admin() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();

    post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 1,
            "product_id": "cola-330ml",
            "max_capacity": 10,
            "low_threshold": 3
        }),
    )
    .await;

    // No admin configured and no user in the request.
    let (status, _) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/restocks/max"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alerts_follow_stock_changes() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();

    let (_, stock) = post_json(
        &ctx.app,
        &format!("/machines/{machine_id}/slots"),
        json!({
            "slot_number": 1,
            "product_id": "cola-330ml",
            "max_capacity": 10,
            "low_threshold": 3
        }),
    )
    .await;
    let stock_id = stock["id"].as_str().unwrap();

    // One empty slot on an under-configured machine.
    let (status, alerts) = get(&ctx.app, &format!("/machines/{machine_id}/alerts")).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = alerts
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["alert_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"Critical"));
    assert!(types.contains(&"Incomplete"));

    // Fill the slot; the empty-slot alert clears.
    post_json(
        &ctx.app,
        &format!("/stock/{stock_id}/delta"),
        json!({ "delta": 10 }),
    )
    .await;

    let (_, alerts) = get(&ctx.app, &format!("/machines/{machine_id}/alerts")).await;
    let types: Vec<&str> = alerts
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["alert_type"].as_str().unwrap())
        .collect();
    assert!(!types.contains(&"Critical"));
    assert!(types.contains(&"Incomplete"));

    // Drain to the threshold; the machine's single slot reads low.
    post_json(
        &ctx.app,
        &format!("/stock/{stock_id}/delta"),
        json!({ "delta": -7 }),
    )
    .await;

    let (_, alerts) = get(&ctx.app, &format!("/machines/{machine_id}/alerts")).await;
    let types: Vec<&str> = alerts
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["alert_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"LowStock"));
}

#[tokio::test]
async fn test_recompute_and_global_alerts() {
    let ctx = setup();
    let machine_id = uuid::Uuid::new_v4();

    // No stored alerts yet for a machine nobody has touched.
    let (status, alerts) = get(&ctx.app, &format!("/machines/{machine_id}/alerts")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(alerts.as_array().unwrap().is_empty());

    let (status, alerts) = post(
        &ctx.app,
        &format!("/machines/{machine_id}/alerts/recompute"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let derived = alerts.as_array().unwrap();
    assert_eq!(derived.len(), 1);
    assert_eq!(derived[0]["alert_type"], "Incomplete");

    let (status, active) = get(&ctx.app, "/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        active
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["machine_id"] == machine_id.to_string())
    );
}

#[tokio::test]
async fn test_catalog_snapshot_survives_price_change() {
    let ctx = setup();

    let (_, created) = post_json(
        &ctx.app,
        "/orders",
        json!({ "items": [{ "product_id": "cola-330ml", "quantity": 2 }] }),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();

    // Reprice the product after the order exists.
    ctx.catalog
        .put_product("cola-330ml", "Cola 330ml", Money::from_minor(999));

    let (_, order) = get(&ctx.app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["items"][0]["unit_price"], 250);
}
