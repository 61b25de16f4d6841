use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::billing::webhook::SIGNATURE_HEADER;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// POST /create-checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<CheckoutResponse>> {
    info!("POST /create-checkout-session - user {}", ctx.user_id());

    let user = state.auth.get_user(ctx.user_id()).await?;
    let checkout_url = state.billing.create_checkout(&user).await?;

    Ok(Json(CheckoutResponse { checkout_url }))
}

/// POST /webhook
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    info!("POST /webhook - {} bytes", body.len());

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.billing.handle_webhook(&body, signature).await?;
    info!("Webhook processed: {:?}", outcome);

    Ok(Json(json!({ "status": "success" })))
}

/// GET /billing/config
pub async fn billing_config(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "publishable_key": state.billing.publishable_key() }))
}

/// GET /success
pub async fn checkout_success() -> Json<Value> {
    Json(json!({ "message": "Payment received. Premium is activated once the payment is confirmed." }))
}

/// GET /cancel
pub async fn checkout_cancel() -> Json<Value> {
    Json(json!({ "message": "Checkout cancelled. No charge was made." }))
}
