use secrecy::Secret;
use storefront_service::config::{
    Config, DatabaseConfig, JwtConfig, PricingConfig, RazorpayConfig, ServerConfig, SmtpConfig,
};
use storefront_service::middleware::auth::issue_token;
use storefront_service::models::Role;
use storefront_service::Application;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_KEY_SECRET: &str = "test_key_secret";
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: mongodb::Database,
    pub db_name: String,
    pub client: reqwest::Client,
    jwt: JwtConfig,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_gateway("https://api.razorpay.com/v1").await
    }

    /// Boot the app on a random port against a per-test database; the
    /// gateway base url can point at a wiremock server.
    pub async fn spawn_with_gateway(gateway_base_url: &str) -> Self {
        let db_name = format!("store_test_{}", Uuid::new_v4().simple());

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig {
                url: Secret::new(
                    std::env::var("TEST_MONGODB_URI")
                        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                ),
                db_name: db_name.clone(),
            },
            jwt: JwtConfig {
                secret: Secret::new(TEST_JWT_SECRET.to_string()),
                expiry_hours: 1,
            },
            razorpay: RazorpayConfig {
                key_id: "rzp_test_key".to_string(),
                key_secret: Secret::new(TEST_KEY_SECRET.to_string()),
                webhook_secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
                api_base_url: gateway_base_url.to_string(),
                timeout_seconds: 5,
            },
            smtp: SmtpConfig {
                enabled: false,
                host: "localhost".to_string(),
                user: String::new(),
                password: Secret::new(String::new()),
                from_email: "store@example.com".to_string(),
            },
            pricing: PricingConfig {
                shipping_price: 50.0,
                tax_rate: 0.18,
            },
            service_name: "storefront-service-test".to_string(),
        };

        let jwt = config.jwt.clone();
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let address = format!("http://127.0.0.1:{}", port);

        // Wait for the server to answer health checks.
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
            client,
            jwt,
        }
    }

    pub async fn cleanup(&self) {
        self.db.drop(None).await.ok();
    }

    /// Bearer token for an ordinary user.
    pub fn user_token(&self, user_id: Uuid) -> String {
        issue_token(&self.jwt, user_id, "user@example.com", Role::User)
            .expect("Failed to issue test token")
    }

    /// Bearer token for an admin.
    pub fn admin_token(&self) -> String {
        issue_token(&self.jwt, Uuid::new_v4(), "admin@example.com", Role::Admin)
            .expect("Failed to issue test token")
    }

    /// Create a product through the admin API and return its id.
    pub async fn create_product(&self, name: &str, price: f64, stock: i64) -> Uuid {
        let response = self
            .client
            .post(format!("{}/products", self.address))
            .bearer_auth(self.admin_token())
            .json(&serde_json::json!({
                "name": name,
                "description": "test product",
                "price": price,
                "stock": stock,
            }))
            .send()
            .await
            .expect("Failed to create product");
        assert_eq!(response.status().as_u16(), 201);

        let body: serde_json::Value = response.json().await.expect("Invalid product response");
        body["_id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("Product id missing")
    }

    /// Current stock of a product, read through the public API.
    pub async fn product_stock(&self, product_id: Uuid) -> i64 {
        let response = self
            .client
            .get(format!("{}/products/{}", self.address, product_id))
            .send()
            .await
            .expect("Failed to fetch product");
        let body: serde_json::Value = response.json().await.expect("Invalid product response");
        body["stock"].as_i64().expect("Stock missing")
    }

    pub async fn add_to_cart(&self, token: &str, product_id: Uuid, quantity: i64) -> reqwest::Response {
        self.client
            .post(format!("{}/cart/items", self.address))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "product_id": product_id,
                "quantity": quantity,
            }))
            .send()
            .await
            .expect("Failed to call add_to_cart")
    }

    pub async fn place_order(&self, token: &str, payment_method: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/orders", self.address))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "shipping_address": {
                    "street": "1 Main St",
                    "city": "Pune",
                    "state": "MH",
                    "zip_code": "411001",
                    "country": "IN",
                },
                "payment_method": payment_method,
            }))
            .send()
            .await
            .expect("Failed to call place_order")
    }

    pub async fn get_cart(&self, token: &str) -> serde_json::Value {
        self.client
            .get(format!("{}/cart", self.address))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to fetch cart")
            .json()
            .await
            .expect("Invalid cart response")
    }

    pub async fn get_order(&self, token: &str, order_id: &str) -> serde_json::Value {
        self.client
            .get(format!("{}/orders/{}", self.address, order_id))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to fetch order")
            .json()
            .await
            .expect("Invalid order response")
    }

    /// Attach a gateway order id to a local order directly in storage, as if
    /// a payment session had been opened.
    pub async fn set_gateway_order_id(&self, order_id: &str, gateway_order_id: &str) {
        use mongodb::bson::doc;
        self.db
            .collection::<mongodb::bson::Document>("orders")
            .update_one(
                doc! { "_id": order_id },
                doc! { "$set": { "gateway_order_id": gateway_order_id } },
                None,
            )
            .await
            .expect("Failed to set gateway order id");
    }

    pub async fn post_webhook(&self, body: &str, signature: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/payment/webhook", self.address))
            .header("X-Razorpay-Signature", signature)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to post webhook")
    }
}
