//! Billing gateway
//!
//! Sells a one-off 30 day premium pass through a hosted checkout page and
//! applies it when the provider's signed `checkout.session.completed`
//! webhook arrives.

mod stripe_client;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::core::auth::{self, AuthManager, User};
use crate::core::db::format_timestamp;
use crate::core::error::{Error, Result};
use stripe::{EventObject, EventType};
use webhook::{checkout_user_id, event_type_name, verify_event};

pub use stripe_client::StripeClient;

pub const PREMIUM_DAYS: i64 = 30;
pub const PREMIUM_PRICE_CENTS: i64 = 500;
pub const PRODUCT_NAME: &str = "Ladybug AI Premium - 30 Days";
pub const PRODUCT_DESCRIPTION: &str = "10 AI requests per day for 30 days";

#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub customer_id: String,
    pub user_id: i64,
    pub client_reference_id: String,
    pub unit_amount: i64,
    pub product_name: &'static str,
    pub product_description: &'static str,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Returns the provider's customer id
    async fn create_customer(&self, email: &str) -> AnyResult<String>;

    async fn create_checkout_session(&self, params: &CheckoutParams) -> AnyResult<CheckoutSession>;
}

#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub public_url: String,
    pub webhook_secret: Option<String>,
    pub publishable_key: Option<String>,
    pub timeout: Duration,
}

/// What a verified webhook did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied {
        user_id: i64,
        premium_until: DateTime<Utc>,
    },
    /// Event id was already applied
    Duplicate,
    UnknownUser(i64),
    Ignored(String),
}

pub struct BillingGateway {
    config: BillingConfig,
    pool: SqlitePool,
    auth: Arc<AuthManager>,
    client: Arc<dyn PaymentClient>,
}

impl BillingGateway {
    pub fn new(
        config: BillingConfig,
        pool: SqlitePool,
        auth: Arc<AuthManager>,
        client: Arc<dyn PaymentClient>,
    ) -> Self {
        Self {
            config,
            pool,
            auth,
            client,
        }
    }

    pub fn publishable_key(&self) -> Option<&str> {
        self.config.publishable_key.as_deref()
    }

    async fn call<T>(&self, what: &str, fut: impl std::future::Future<Output = AnyResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("[Billing] {} failed: {:#}", what, e);
                Err(Error::Service(e.to_string()))
            }
            Err(_) => {
                warn!("[Billing] {} timed out", what);
                Err(Error::Service(format!("{} timed out", what)))
            }
        }
    }

    /// Create a hosted checkout page for the premium pass and return its URL
    pub async fn create_checkout(&self, user: &User) -> Result<String> {
        let customer_id = match &user.stripe_customer_id {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .call("Customer creation", self.client.create_customer(&user.email))
                    .await?;
                self.auth.set_stripe_customer(user.id, &id).await?;
                info!("[Billing] Created customer for user {}", user.id);
                id
            }
        };

        let params = CheckoutParams {
            customer_id,
            user_id: user.id,
            client_reference_id: user.id.to_string(),
            unit_amount: PREMIUM_PRICE_CENTS,
            product_name: PRODUCT_NAME,
            product_description: PRODUCT_DESCRIPTION,
            success_url: format!(
                "{}/success?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.public_url
            ),
            cancel_url: format!("{}/cancel", self.config.public_url),
        };

        let session = self
            .call("Checkout creation", self.client.create_checkout_session(&params))
            .await?;

        info!(
            "[Billing] Checkout session {} created for user {}",
            session.id, user.id
        );

        Ok(session.url)
    }

    /// Verify and apply a webhook delivery
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome> {
        self.handle_webhook_at(payload, signature, Utc::now()).await
    }

    /// `now` stamps the entitlement; signature freshness is always checked
    /// against the wall clock.
    pub async fn handle_webhook_at(
        &self,
        payload: &[u8],
        signature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome> {
        let Some(secret) = self.config.webhook_secret.as_deref() else {
            warn!("[Billing] Webhook received but no webhook secret is configured");
            return Err(Error::InvalidSignature);
        };
        let Some(signature) = signature else {
            warn!("[Billing] Webhook without signature header");
            return Err(Error::InvalidSignature);
        };

        let event = verify_event(payload, signature, secret).inspect_err(|e| {
            warn!("[Billing] Webhook rejected: {}", e);
        })?;
        let event_id = event.id.to_string();
        let event_type = event_type_name(&event.type_);

        if event.type_ != EventType::CheckoutSessionCompleted {
            info!("[Billing] Ignoring {} event {}", event_type, event_id);
            return Ok(WebhookOutcome::Ignored(event_type));
        }

        let EventObject::CheckoutSession(session) = &event.data.object else {
            return Err(Error::InvalidPayload(
                "checkout event without a checkout session".to_string(),
            ));
        };
        let user_id = checkout_user_id(session)?;
        let premium_until = now + chrono::Duration::days(PREMIUM_DAYS);

        let mut tx = self.pool.begin().await?;

        let recorded = sqlx::query(
            "INSERT OR IGNORE INTO billing_events (event_id, event_type, processed_at) VALUES (?, ?, ?)",
        )
        .bind(&event_id)
        .bind(&event_type)
        .bind(format_timestamp(now))
        .execute(&mut *tx)
        .await?;

        if recorded.rows_affected() == 0 {
            tx.rollback().await?;
            info!("[Billing] Event {} already applied", event_id);
            return Ok(WebhookOutcome::Duplicate);
        }

        if !auth::grant_premium(&mut *tx, user_id, premium_until).await? {
            // Keep the event unrecorded so a corrected replay can still apply
            tx.rollback().await?;
            warn!("[Billing] Event {} names unknown user {}", event_id, user_id);
            return Ok(WebhookOutcome::UnknownUser(user_id));
        }

        tx.commit().await?;

        info!(
            "[Billing] User {} is premium until {}",
            user_id, premium_until
        );

        Ok(WebhookOutcome::Applied {
            user_id,
            premium_until,
        })
    }
}
