//! Core Router
//!
//! Public routes (credentials, webhook, redirects) and the session-gated
//! routes wrapped by `mw_require_auth`.

use crate::core::auth::handlers as auth_handlers;
use crate::core::auth::middleware::mw_require_auth;
use crate::core::AppState;
use crate::handlers;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/logout", post(auth_handlers::logout))
        .route("/status", get(handlers::status))
        .route("/chat", post(handlers::chat))
        .route("/conversations", get(handlers::list_conversations))
        .route("/conversation/{id}", get(handlers::get_conversation))
        .route(
            "/create-checkout-session",
            post(handlers::create_checkout_session),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw_require_auth,
        ));

    Router::new()
        // Auth routes
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        // Billing
        .route("/webhook", post(handlers::webhook))
        .route("/billing/config", get(handlers::billing_config))
        .route("/success", get(handlers::checkout_success))
        .route("/cancel", get(handlers::checkout_cancel))
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
