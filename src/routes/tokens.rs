use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::routes::require;
use crate::AppState;

/// Router for device-token registration, nested under both role prefixes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/save-token", post(save_token))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTokenRequest {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveTokenResponse {
    pub success: bool,
}

/// Registers the device token for a user; a later registration for the
/// same user replaces the previous token.
async fn save_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveTokenRequest>,
) -> AppResult<Json<SaveTokenResponse>> {
    let user_id = require(req.user_id, "userId")?;
    let token = require(req.token, "token")?;

    state.tokens.save(&user_id, &token).await;
    tracing::info!("Device token saved for user {}", user_id);

    Ok(Json(SaveTokenResponse { success: true }))
}
