pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use store_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    CartService, CheckoutService, EmailService, InventoryService, RazorpayClient,
    ReconciliationEngine, StoreRepository,
};

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub config: Config,
    pub repository: StoreRepository,
    pub inventory: InventoryService,
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub reconciliation: ReconciliationEngine,
    pub email: EmailService,
}

pub struct Application {
    port: u16,
    listener: tokio::net::TcpListener,
    router: Router,
    db: mongodb::Database,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some(config.service_name.clone());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let repository = StoreRepository::new(&db);
        repository.init_indexes().await?;

        let gateway = RazorpayClient::new(config.razorpay.clone());
        if gateway.is_configured() {
            tracing::info!("Payment gateway client initialized");
        } else {
            tracing::warn!("Gateway credentials not configured - online payments will be limited");
        }

        let inventory = InventoryService::new(repository.clone());
        let cart = CartService::new(repository.clone(), inventory.clone());
        let checkout = CheckoutService::new(
            repository.clone(),
            inventory.clone(),
            cart.clone(),
            config.pricing.clone(),
        );
        let reconciliation = ReconciliationEngine::new(
            repository.clone(),
            inventory.clone(),
            cart.clone(),
            gateway,
        );
        let email = EmailService::new(&config.smtp, "Storefront")?;

        services::init_metrics();

        let state = AppState {
            db,
            config: config.clone(),
            repository,
            inventory,
            cart,
            checkout,
            reconciliation,
            email,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            // auth
            .route("/auth/register", post(handlers::auth::register))
            .route("/auth/login", post(handlers::auth::login))
            // catalog
            .route("/products", get(handlers::products::list_products))
            .route("/products", post(handlers::products::create_product))
            .route("/products/:id", get(handlers::products::get_product))
            .route("/products/:id", put(handlers::products::update_product))
            .route("/products/:id", delete(handlers::products::delete_product))
            // cart (owner-scoped)
            .route("/cart", get(handlers::cart::get_cart))
            .route("/cart/items", post(handlers::cart::add_item))
            .route("/cart/items/:id", put(handlers::cart::update_item))
            .route("/cart/items/:id", delete(handlers::cart::remove_item))
            // orders
            .route("/orders", post(handlers::orders::place_order))
            .route("/orders", get(handlers::orders::list_own_orders))
            .route("/orders/all", get(handlers::orders::list_all_orders))
            .route("/orders/:id", get(handlers::orders::get_order))
            .route(
                "/orders/:id/status",
                put(handlers::orders::update_order_status),
            )
            // payments
            .route(
                "/payment/create-order",
                post(handlers::payments::create_payment_order),
            )
            .route("/payment/verify", post(handlers::payments::verify_payment))
            .route("/payment/sync-order", post(handlers::payments::sync_order))
            .route("/payment/webhook", post(handlers::payments::webhook))
            // admin user management
            .route("/users", get(handlers::users::list_users))
            .route("/users/:id", get(handlers::users::get_user))
            .route("/users/:id", delete(handlers::users::delete_user))
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
            db: state.db,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!(port = self.port, "Listening");
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
