//! Ladybug AI server library
//!
//! Accounts and sessions, per-day chat quotas, conversation history, an LLM
//! proxy and a one-off premium pass sold through Stripe.

pub mod ai;
pub mod billing;
pub mod conversations;
pub mod core;
pub mod handlers;
pub mod usage;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use ai::{AiConfig, CompletionClient, CompletionGateway, GenAiCompletionClient};
use billing::{BillingConfig, BillingGateway, PaymentClient, StripeClient};
use conversations::ConversationStore;
use crate::core::auth::AuthManager;
use crate::core::{AppState, ServerConfig};
use usage::UsageLedger;

/// Wire every component from a config and the two external clients
pub async fn build_state(
    config: ServerConfig,
    completion_client: Arc<dyn CompletionClient>,
    payment_client: Arc<dyn PaymentClient>,
) -> anyhow::Result<AppState> {
    let pool = crate::core::db::connect(&config.database_url).await?;

    let auth = Arc::new(AuthManager::new(
        pool.clone(),
        &config.secret_key,
        config.session_ttl,
    ));
    info!("Auth Manager initialized");

    let completions = Arc::new(CompletionGateway::new(
        AiConfig {
            model: config.model.clone(),
            timeout: config.upstream_timeout,
            ..AiConfig::default()
        },
        completion_client,
    ));

    let billing = Arc::new(BillingGateway::new(
        BillingConfig {
            public_url: config.public_url.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            publishable_key: config.stripe_publishable_key.clone(),
            timeout: config.upstream_timeout,
        },
        pool.clone(),
        auth.clone(),
        payment_client,
    ));

    Ok(AppState {
        usage: Arc::new(UsageLedger::new(pool.clone())),
        conversations: Arc::new(ConversationStore::new(pool.clone())),
        config: Arc::new(config),
        pool,
        auth,
        completions,
        billing,
    })
}

pub async fn run() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Already set, ignore
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    info!("=== Ladybug AI Server ===");

    let config = ServerConfig::from_env()?;

    if config.anthropic_api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY not set; chat requests will fail upstream");
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set; checkout is unavailable");
    }

    let completion_client = Arc::new(GenAiCompletionClient::new(
        config.anthropic_api_key.clone(),
    ));
    let payment_client = Arc::new(StripeClient::new(config.stripe_secret_key.clone()));

    let port = config.port;
    let state = build_state(config, completion_client, payment_client).await?;
    let app = crate::core::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Ladybug AI listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
