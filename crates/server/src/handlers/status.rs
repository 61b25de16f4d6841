use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::core::auth::handlers::UserSummary;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use crate::usage::{Tier, UsageSummary};

#[derive(Debug, Serialize)]
pub struct StatusUser {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub tier: Tier,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub user: StatusUser,
    pub usage: UsageSummary,
}

/// GET /status
pub async fn status(State(state): State<AppState>, ctx: Ctx) -> Result<Json<StatusResponse>> {
    let user = state.auth.get_user(ctx.user_id()).await?;
    let usage = state.usage.summary(&user).await?;

    Ok(Json(StatusResponse {
        user: StatusUser {
            summary: (&user).into(),
            tier: Tier::of(&user, Utc::now()),
        },
        usage,
    }))
}
