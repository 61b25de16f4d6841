//! Server configuration
//!
//! Everything is read from the environment once in [`ServerConfig::from_env`]
//! and then shared read-only through [`AppState`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use sqlx::SqlitePool;
use tracing::warn;

use crate::ai::CompletionGateway;
use crate::billing::BillingGateway;
use crate::conversations::ConversationStore;
use crate::core::auth::AuthManager;
use crate::usage::UsageLedger;

const DEV_SECRET_KEY: &str = "ladybug-secret-key-change-in-production";

/// Configuration for the Ladybug server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// SQLite connection string
    pub database_url: String,
    /// Secret used to sign session credentials
    pub secret_key: String,
    pub anthropic_api_key: Option<String>,
    /// Model name handed to the completion client
    pub model: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_publishable_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub port: u16,
    /// Base URL used to build payment redirect targets
    pub public_url: String,
    pub session_ttl: chrono::Duration,
    /// Upper bound on every outbound call (LLM and payment provider)
    pub upstream_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://ladybug.db".to_string(),
            secret_key: DEV_SECRET_KEY.to_string(),
            anthropic_api_key: None,
            model: "claude-3-5-sonnet-20241022".to_string(),
            stripe_secret_key: None,
            stripe_publishable_key: None,
            stripe_webhook_secret: None,
            port: 5000,
            public_url: "http://localhost:5000".to_string(),
            session_ttl: chrono::Duration::days(30),
            upstream_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").unwrap_or(defaults.database_url);
        if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
            bail!("DATABASE_URL must point at SQLite (got a postgres URL)");
        }

        let secret_key = match var("SECRET_KEY") {
            Some(key) => key,
            None => {
                warn!("SECRET_KEY not set, using the development default");
                defaults.secret_key
            }
        };

        let port = parse_var(&var, "PORT")?.unwrap_or(defaults.port);
        let public_url = var("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let session_ttl = parse_var::<i64>(&var, "SESSION_TTL_DAYS")?
            .map(chrono::Duration::days)
            .unwrap_or(defaults.session_ttl);
        let upstream_timeout = parse_var::<u64>(&var, "UPSTREAM_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.upstream_timeout);

        Ok(Self {
            database_url,
            secret_key,
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            model: var("LADYBUG_MODEL").unwrap_or(defaults.model),
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_publishable_key: var("STRIPE_PUBLISHABLE_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            port,
            public_url,
            session_ttl,
            upstream_timeout,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
        })
        .transpose()
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub pool: SqlitePool,
    pub auth: Arc<AuthManager>,
    pub usage: Arc<UsageLedger>,
    pub conversations: Arc<ConversationStore>,
    pub completions: Arc<CompletionGateway>,
    pub billing: Arc<BillingGateway>,
}
