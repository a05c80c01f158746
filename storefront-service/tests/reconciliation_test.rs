//! End-to-end reconciliation scenarios: the same payment reported through
//! the verify endpoint and the webhook, duplicated, out of order, with
//! stock reserved exactly once no matter how many signals arrive.

mod common;

use common::{TestApp, TEST_KEY_SECRET, TEST_WEBHOOK_SECRET};
use store_core::signature::{compute_hmac, payment_signature_payload};
use uuid::Uuid;

const GW_ORDER: &str = "order_Nf9vK2mPqR";
const GW_PAYMENT: &str = "pay_Nf9wL4xTsU";

fn checkout_signature(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    let payload = payment_signature_payload(gateway_order_id, gateway_payment_id);
    compute_hmac(TEST_KEY_SECRET, payload.as_bytes()).unwrap()
}

fn webhook_body(event: &str, payment_id: &str, gateway_order_id: &str, status: &str) -> String {
    serde_json::json!({
        "event": event,
        "created_at": 1_700_000_000u64,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "amount": 28_600u64,
                    "currency": "INR",
                    "status": status,
                    "order_id": gateway_order_id,
                    "method": "upi",
                    "created_at": 1_700_000_000u64
                }
            }
        }
    })
    .to_string()
}

fn webhook_signature(body: &str) -> String {
    compute_hmac(TEST_WEBHOOK_SECRET, body.as_bytes()).unwrap()
}

/// Place an ONLINE order for 2 units of a 100.0 product (stock 5) and
/// attach a gateway order id, as create-payment-order would have.
async fn online_order(app: &TestApp, token: &str) -> (Uuid, String) {
    let product_id = app.create_product("widget", 100.0, 5).await;
    app.add_to_cart(token, product_id, 2).await;
    let response = app.place_order(token, "ONLINE").await;
    assert_eq!(response.status().as_u16(), 201);
    let order: serde_json::Value = response.json().await.unwrap();
    let order_id = order["_id"].as_str().unwrap().to_string();
    app.set_gateway_order_id(&order_id, GW_ORDER).await;
    (product_id, order_id)
}

async fn post_verify(
    app: &TestApp,
    token: &str,
    order_id: &str,
    signature: &str,
) -> reqwest::Response {
    app.client
        .post(format!("{}/payment/verify", app.address))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "order_id": order_id,
            "gateway_order_id": GW_ORDER,
            "gateway_payment_id": GW_PAYMENT,
            "signature": signature,
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn verify_completes_order_reserves_stock_and_clears_cart() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;

    let response = post_verify(&app, &token, &order_id, &checkout_signature(GW_ORDER, GW_PAYMENT)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["already_processed"], false);
    assert_eq!(body["order"]["is_paid"], true);
    assert_eq!(body["order"]["payment_status"], "completed");
    assert_eq!(body["order"]["status"], "processing");
    assert_eq!(body["order"]["gateway_payment_id"], GW_PAYMENT);

    assert_eq!(app.product_stock(product_id).await, 3);
    let cart = app.get_cart(&token).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    app.cleanup().await;
}

#[tokio::test]
async fn duplicate_verify_reports_already_processed() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;
    let signature = checkout_signature(GW_ORDER, GW_PAYMENT);

    let first = post_verify(&app, &token, &order_id, &signature).await;
    assert_eq!(first.status().as_u16(), 200);

    let second = post_verify(&app, &token, &order_id, &signature).await;
    assert_eq!(second.status().as_u16(), 200);
    let body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(body["already_processed"], true);
    assert_eq!(body["order"]["is_paid"], true);

    // Stock went down once, not twice.
    assert_eq!(app.product_stock(product_id).await, 3);

    app.cleanup().await;
}

#[tokio::test]
async fn tampered_signature_is_rejected_without_side_effects() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;

    // Signed over a different payment id than the one submitted.
    let forged = checkout_signature(GW_ORDER, "pay_somebodyelse");
    let response = post_verify(&app, &token, &order_id, &forged).await;
    assert_eq!(response.status().as_u16(), 400);

    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["is_paid"], false);
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(app.product_stock(product_id).await, 5);
    let cart = app.get_cart(&token).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn verify_requires_order_ownership() {
    let app = TestApp::spawn().await;
    let owner = app.user_token(Uuid::new_v4());
    let (_, order_id) = online_order(&app, &owner).await;

    let intruder = app.user_token(Uuid::new_v4());
    let response = post_verify(
        &app,
        &intruder,
        &order_id,
        &checkout_signature(GW_ORDER, GW_PAYMENT),
    )
    .await;
    assert_eq!(response.status().as_u16(), 403);

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_capture_completes_order_before_any_verify() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;

    // Webhook-first arrival: no verify call has stored the payment id yet,
    // so the order is matched through the payment's gateway order id.
    let body = webhook_body("payment.captured", GW_PAYMENT, GW_ORDER, "captured");
    let response = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(response.status().as_u16(), 200);

    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["is_paid"], true);
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(order["status"], "processing");
    assert_eq!(app.product_stock(product_id).await, 3);
    let cart = app.get_cart(&token).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_replay_reserves_stock_once() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, _) = online_order(&app, &token).await;

    let body = webhook_body("payment.captured", GW_PAYMENT, GW_ORDER, "captured");
    let signature = webhook_signature(&body);
    for _ in 0..3 {
        let response = app.post_webhook(&body, &signature).await;
        assert_eq!(response.status().as_u16(), 200);
    }

    assert_eq!(app.product_stock(product_id).await, 3);

    app.cleanup().await;
}

#[tokio::test]
async fn verify_then_webhook_is_one_completion() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;

    let verify = post_verify(&app, &token, &order_id, &checkout_signature(GW_ORDER, GW_PAYMENT)).await;
    assert_eq!(verify.status().as_u16(), 200);

    let body = webhook_body("payment.captured", GW_PAYMENT, GW_ORDER, "captured");
    let webhook = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(webhook.status().as_u16(), 200);

    assert_eq!(app.product_stock(product_id).await, 3);
    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["is_paid"], true);

    app.cleanup().await;
}

#[tokio::test]
async fn failed_payment_records_failure_and_allows_a_later_capture() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;

    let failed = webhook_body("payment.failed", "pay_attempt1", GW_ORDER, "failed");
    let response = app.post_webhook(&failed, &webhook_signature(&failed)).await;
    assert_eq!(response.status().as_u16(), 200);

    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["is_paid"], false);
    assert_eq!(order["payment_status"], "failed");
    assert_eq!(app.product_stock(product_id).await, 5);

    // The customer retries and the second attempt captures.
    let captured = webhook_body("payment.captured", "pay_attempt2", GW_ORDER, "captured");
    let response = app.post_webhook(&captured, &webhook_signature(&captured)).await;
    assert_eq!(response.status().as_u16(), 200);

    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["is_paid"], true);
    assert_eq!(order["payment_status"], "completed");
    assert_eq!(app.product_stock(product_id).await, 3);

    app.cleanup().await;
}

#[tokio::test]
async fn refund_webhook_clears_is_paid() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (_, order_id) = online_order(&app, &token).await;

    let captured = webhook_body("payment.captured", GW_PAYMENT, GW_ORDER, "captured");
    app.post_webhook(&captured, &webhook_signature(&captured)).await;

    let refunded = webhook_body("payment.refunded", GW_PAYMENT, GW_ORDER, "refunded");
    let response = app.post_webhook(&refunded, &webhook_signature(&refunded)).await;
    assert_eq!(response.status().as_u16(), 200);

    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(order["is_paid"], false);

    // A replayed capture after the refund must not flip the order back.
    app.post_webhook(&captured, &webhook_signature(&captured)).await;
    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["payment_status"], "refunded");
    assert_eq!(order["is_paid"], false);

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let (product_id, order_id) = online_order(&app, &token).await;

    let body = webhook_body("payment.captured", GW_PAYMENT, GW_ORDER, "captured");
    let response = app.post_webhook(&body, "deadbeef").await;
    assert_eq!(response.status().as_u16(), 400);

    let order = app.get_order(&token, &order_id).await;
    assert_eq!(order["is_paid"], false);
    assert_eq!(app.product_stock(product_id).await, 5);

    app.cleanup().await;
}

#[tokio::test]
async fn webhook_without_signature_header_is_rejected() {
    let app = TestApp::spawn().await;

    let body = webhook_body("payment.captured", GW_PAYMENT, GW_ORDER, "captured");
    let response = app
        .client
        .post(format!("{}/payment/webhook", app.address))
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_event_types_are_acknowledged() {
    let app = TestApp::spawn().await;

    let body = serde_json::json!({
        "event": "invoice.paid",
        "created_at": 1_700_000_000u64,
        "payload": {}
    })
    .to_string();
    let response = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(response.status().as_u16(), 200);

    app.cleanup().await;
}

#[tokio::test]
async fn capture_for_unknown_order_is_acknowledged() {
    let app = TestApp::spawn().await;

    let body = webhook_body("payment.captured", "pay_stray", "order_unknown", "captured");
    let response = app.post_webhook(&body, &webhook_signature(&body)).await;
    assert_eq!(response.status().as_u16(), 200);

    app.cleanup().await;
}
