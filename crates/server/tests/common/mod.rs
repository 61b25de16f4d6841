#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ladybug_server::ai::{CompletionClient, CompletionRequest};
use ladybug_server::billing::{CheckoutParams, CheckoutSession, PaymentClient};
use ladybug_server::conversations::Role;
use ladybug_server::core::{AppState, ServerConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_millis(500);

/// A `checkout.session.completed` delivery as the provider sends it
pub fn checkout_completed_event(event_id: &str, user_id: i64) -> Vec<u8> {
    let created = chrono::Utc::now().timestamp();
    json!({
        "id": event_id,
        "object": "event",
        "api_version": null,
        "created": created,
        "data": {
            "object": {
                "id": "cs_test_a1",
                "object": "checkout.session",
                "after_expiration": null,
                "allow_promotion_codes": null,
                "amount_subtotal": 500,
                "amount_total": 500,
                "automatic_tax": { "enabled": false, "liability": null, "status": null },
                "billing_address_collection": null,
                "cancel_url": "http://ladybug.test/cancel",
                "client_reference_id": user_id.to_string(),
                "consent": null,
                "consent_collection": null,
                "created": created,
                "currency": "usd",
                "custom_fields": [],
                "custom_text": {
                    "shipping_address": null,
                    "submit": null,
                    "terms_of_service_acceptance": null
                },
                "customer": "cus_1",
                "customer_creation": null,
                "customer_details": null,
                "customer_email": null,
                "expires_at": created + 86_400,
                "invoice": null,
                "invoice_creation": null,
                "livemode": false,
                "locale": null,
                "metadata": { "user_id": user_id.to_string() },
                "mode": "payment",
                "payment_intent": null,
                "payment_link": null,
                "payment_method_types": ["card"],
                "payment_status": "paid",
                "recovered_from": null,
                "setup_intent": null,
                "shipping_address_collection": null,
                "shipping_cost": null,
                "shipping_details": null,
                "shipping_options": [],
                "status": "complete",
                "submit_type": null,
                "subscription": null,
                "success_url": "http://ladybug.test/success?session_id={CHECKOUT_SESSION_ID}",
                "total_details": { "amount_discount": 0, "amount_shipping": 0, "amount_tax": 0 },
                "url": null
            }
        },
        "livemode": false,
        "pending_webhooks": 1,
        "request": { "id": null, "idempotency_key": null },
        "type": "checkout.session.completed"
    })
    .to_string()
    .into_bytes()
}

/// Any other event type, here a customer being created
pub fn customer_created_event(event_id: &str) -> Vec<u8> {
    json!({
        "id": event_id,
        "object": "event",
        "api_version": null,
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": "cus_1",
                "object": "customer",
                "created": chrono::Utc::now().timestamp(),
                "email": "a@b.com",
                "livemode": false,
                "metadata": {}
            }
        },
        "livemode": false,
        "pending_webhooks": 1,
        "request": { "id": null, "idempotency_key": null },
        "type": "customer.created"
    })
    .to_string()
    .into_bytes()
}

/// Echoes the last user turn, or fails on demand
#[derive(Default)]
pub struct FakeLlm {
    pub fail: AtomicBool,
    /// Milliseconds to wait before answering
    pub delay_ms: AtomicU64,
    pub calls: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl CompletionClient for FakeLlm {
    async fn complete(&self, request: CompletionRequest<'_>) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((request.system.to_string(), request.messages.len()));

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("upstream overloaded");
        }

        let last = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("echo: {}", last))
    }
}

#[derive(Default)]
pub struct FakePayments {
    /// Every call errors
    pub fail: AtomicBool,
    /// Checkout creation never answers
    pub stall: AtomicBool,
    pub customers: AtomicUsize,
    pub checkouts: Mutex<Vec<CheckoutParams>>,
}

#[async_trait]
impl PaymentClient for FakePayments {
    async fn create_customer(&self, _email: &str) -> anyhow::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("card network unavailable");
        }
        let n = self.customers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cus_{}", n))
    }

    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> anyhow::Result<CheckoutSession> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("card network unavailable");
        }
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(params.clone());
        let id = format!("cs_{}", checkouts.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.test/{}", id),
            id,
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub llm: Arc<FakeLlm>,
    pub payments: Arc<FakePayments>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            database_url: format!("sqlite://{}", dir.path().join("ladybug.db").display()),
            secret_key: "test-secret".to_string(),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            stripe_publishable_key: Some("pk_test".to_string()),
            public_url: "http://ladybug.test".to_string(),
            upstream_timeout: UPSTREAM_TIMEOUT,
            ..ServerConfig::default()
        };

        let llm = Arc::new(FakeLlm::default());
        let payments = Arc::new(FakePayments::default());
        let state = ladybug_server::build_state(config, llm.clone(), payments.clone())
            .await
            .unwrap();

        Self {
            router: ladybug_server::core::router(state.clone()),
            state,
            llm,
            payments,
            _dir: dir,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Register and return the session credential
    pub async fn register(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                "POST",
                "/register",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn chat(&self, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", "/chat", Some(token), Some(body)).await
    }

    pub async fn user_id(&self, email: &str) -> i64 {
        let (id,): (i64,) = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.state.pool)
            .await
            .unwrap();
        id
    }

    pub async fn usage_today(&self, email: &str) -> i64 {
        let id = self.user_id(email).await;
        self.state.usage.count_today(id).await.unwrap()
    }
}
