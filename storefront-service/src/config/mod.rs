use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub razorpay: RazorpayConfig,
    pub smtp: SmtpConfig,
    pub pricing: PricingConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub expiry_hours: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    /// Outbound call timeout; gateway calls fail as retryable 503s rather
    /// than hanging a request handler.
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
}

/// Flat shipping surcharge and tax rate applied at checkout.
#[derive(Deserialize, Clone, Debug)]
pub struct PricingConfig {
    pub shipping_price: f64,
    pub tax_rate: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("STORE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("STORE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let db_url = env::var("STORE_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name = env::var("STORE_DATABASE_NAME").unwrap_or_else(|_| "store_db".to_string());

        let jwt_secret = env::var("STORE_JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());
        let jwt_expiry_hours = env::var("STORE_JWT_EXPIRY_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()?;

        let razorpay_key_id = env::var("RAZORPAY_KEY_ID").unwrap_or_default();
        let razorpay_key_secret = env::var("RAZORPAY_KEY_SECRET").unwrap_or_default();
        let razorpay_webhook_secret = env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default();
        let razorpay_api_base_url = env::var("RAZORPAY_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string());
        let razorpay_timeout_seconds = env::var("RAZORPAY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;

        let smtp_enabled = env::var("SMTP_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let smtp_user = env::var("SMTP_USER").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let smtp_from = env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| smtp_user.clone());

        let shipping_price = env::var("STORE_SHIPPING_PRICE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()?;
        let tax_rate = env::var("STORE_TAX_RATE")
            .unwrap_or_else(|_| "0.18".to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            jwt: JwtConfig {
                secret: Secret::new(jwt_secret),
                expiry_hours: jwt_expiry_hours,
            },
            razorpay: RazorpayConfig {
                key_id: razorpay_key_id,
                key_secret: Secret::new(razorpay_key_secret),
                webhook_secret: Secret::new(razorpay_webhook_secret),
                api_base_url: razorpay_api_base_url,
                timeout_seconds: razorpay_timeout_seconds,
            },
            smtp: SmtpConfig {
                enabled: smtp_enabled,
                host: smtp_host,
                user: smtp_user,
                password: Secret::new(smtp_password),
                from_email: smtp_from,
            },
            pricing: PricingConfig {
                shipping_price,
                tax_rate,
            },
            service_name: "storefront-service".to_string(),
        })
    }
}
