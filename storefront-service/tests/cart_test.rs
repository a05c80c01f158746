mod common;

use common::TestApp;
use uuid::Uuid;

#[tokio::test]
async fn cart_starts_empty() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());

    let cart = app.get_cart(&token).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    assert_eq!(cart["total"].as_f64().unwrap(), 0.0);

    app.cleanup().await;
}

#[tokio::test]
async fn add_item_snapshots_price_and_recomputes_total() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 100.0, 5).await;

    let response = app.add_to_cart(&token, product_id, 2).await;
    assert!(response.status().is_success());
    let cart: serde_json::Value = response.json().await.unwrap();

    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["price"].as_f64().unwrap(), 100.0);
    assert_eq!(cart["total"].as_f64().unwrap(), 200.0);

    app.cleanup().await;
}

#[tokio::test]
async fn adding_same_product_merges_quantities() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 100.0, 5).await;

    app.add_to_cart(&token, product_id, 2).await;
    let response = app.add_to_cart(&token, product_id, 1).await;
    let cart: serde_json::Value = response.json().await.unwrap();

    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"].as_i64().unwrap(), 3);
    assert_eq!(cart["total"].as_f64().unwrap(), 300.0);

    app.cleanup().await;
}

#[tokio::test]
async fn add_item_beyond_stock_fails_with_available() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 100.0, 5).await;

    let response = app.add_to_cart(&token, product_id, 6).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["available"].as_i64().unwrap(), 5);

    app.cleanup().await;
}

#[tokio::test]
async fn merged_quantity_is_checked_against_stock() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 100.0, 5).await;

    app.add_to_cart(&token, product_id, 3).await;
    let response = app.add_to_cart(&token, product_id, 3).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["available"].as_i64().unwrap(), 5);

    app.cleanup().await;
}

#[tokio::test]
async fn cart_add_reserves_nothing() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 100.0, 5).await;

    app.add_to_cart(&token, product_id, 5).await;
    assert_eq!(app.product_stock(product_id).await, 5);

    app.cleanup().await;
}

#[tokio::test]
async fn update_and_remove_item() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 40.0, 10).await;

    let response = app.add_to_cart(&token, product_id, 1).await;
    let cart: serde_json::Value = response.json().await.unwrap();
    let item_id = cart["items"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .client
        .put(format!("{}/cart/items/{}", app.address, item_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "quantity": 4 }))
        .send()
        .await
        .unwrap();
    let cart: serde_json::Value = response.json().await.unwrap();
    assert_eq!(cart["items"][0]["quantity"].as_i64().unwrap(), 4);
    assert_eq!(cart["total"].as_f64().unwrap(), 160.0);

    let response = app
        .client
        .delete(format!("{}/cart/items/{}", app.address, item_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let cart: serde_json::Value = response.json().await.unwrap();
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
    assert_eq!(cart["total"].as_f64().unwrap(), 0.0);

    app.cleanup().await;
}

#[tokio::test]
async fn updating_unknown_item_is_not_found() {
    let app = TestApp::spawn().await;
    let token = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 40.0, 10).await;
    app.add_to_cart(&token, product_id, 1).await;

    let response = app
        .client
        .put(format!("{}/cart/items/{}", app.address, Uuid::new_v4()))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    app.cleanup().await;
}

#[tokio::test]
async fn carts_are_scoped_per_user() {
    let app = TestApp::spawn().await;
    let alice = app.user_token(Uuid::new_v4());
    let bob = app.user_token(Uuid::new_v4());
    let product_id = app.create_product("widget", 10.0, 10).await;

    app.add_to_cart(&alice, product_id, 2).await;

    let bob_cart = app.get_cart(&bob).await;
    assert_eq!(bob_cart["items"].as_array().unwrap().len(), 0);

    app.cleanup().await;
}
