//! Outbound mail.
//!
//! The welcome mail on registration is fire-and-forget: it runs in a spawned
//! task, failures are logged, and nothing ever propagates back into the
//! registration flow.

use crate::config::SmtpConfig;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use secrecy::ExposeSecret;
use std::time::Duration;
use store_core::error::AppError;

#[derive(Clone)]
pub struct EmailService {
    mailer: Option<SmtpTransport>,
    from_email: String,
    store_name: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig, store_name: &str) -> Result<Self, AppError> {
        let mailer = if config.enabled {
            let creds = Credentials::new(
                config.user.clone(),
                config.password.expose_secret().clone(),
            );
            let transport = SmtpTransport::relay(&config.host)
                .map_err(|e| AppError::EmailError(e.to_string()))?
                .credentials(creds)
                .port(587)
                .timeout(Some(Duration::from_secs(10)))
                .build();
            tracing::info!(host = %config.host, "Email service initialized");
            Some(transport)
        } else {
            tracing::warn!("SMTP disabled; outbound mail will be dropped");
            None
        };

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
            store_name: store_name.to_string(),
        })
    }

    /// Spawn the welcome mail without awaiting it. Registration must never
    /// fail or roll back because mail delivery did.
    pub fn send_welcome_detached(&self, to_email: &str, name: &str) {
        let service = self.clone();
        let to_email = to_email.to_string();
        let name = name.to_string();
        tokio::spawn(async move {
            if let Err(err) = service.send_welcome(&to_email, &name).await {
                tracing::error!(to = %to_email, error = %err, "Failed to send welcome email");
            }
        });
    }

    async fn send_welcome(&self, to_email: &str, name: &str) -> Result<(), AppError> {
        let Some(mailer) = self.mailer.clone() else {
            tracing::debug!(to = %to_email, "SMTP disabled, skipping welcome email");
            return Ok(());
        };

        let body = format!(
            "Hi {name},\n\nWelcome to {store}! Your account is ready.\n\nHappy shopping,\nThe {store} team\n",
            name = name,
            store = self.store_name,
        );

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        AppError::EmailError(e.to_string())
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))?)
            .subject(format!("Welcome to {}", self.store_name))
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        // SMTP transport is blocking; keep it off the async runtime.
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::EmailError(e.to_string()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, "Welcome email sent");
                Ok(())
            }
            Err(e) => Err(AppError::EmailError(e.to_string())),
        }
    }
}
