use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::routes::require;
use crate::services::dispatch::DispatchOutcome;
use crate::store::models::{NotificationKind, NotificationRecord, Page, PageQuery, ReadFilter};
use crate::store::{paginate, MarkReadOutcome};
use crate::AppState;

/// History routes shared by both portals.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications/:user_id", get(list_notifications))
        .route("/notifications/mark-read", post(mark_read))
}

/// Admin-portal trigger: provider registration notifications. Kept on its
/// own router so the rate limiter wraps only the trigger endpoints.
pub fn admin_trigger_router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/trigger-notification",
        post(trigger_provider_registration),
    )
}

/// User-portal trigger: document status notifications.
pub fn user_trigger_router() -> Router<Arc<AppState>> {
    Router::new().route("/trigger-notification", post(trigger_document_status))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRegistrationRequest {
    pub user_id: Option<String>,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusRequest {
    pub user_id: Option<String>,
    pub document_id: Option<String>,
    pub document_type: Option<String>,
    pub provider_name: Option<String>,
    pub status: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub notification: NotificationRecord,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub user_id: Option<String>,
    pub notification_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub notification: NotificationRecord,
}

// ============================================================================
// Handlers
// ============================================================================

async fn trigger_provider_registration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProviderRegistrationRequest>,
) -> Result<Json<TriggerResponse>, AppErrorWithDetails> {
    let user_id = require(req.user_id, "userId")?;
    let provider_id = require(req.provider_id, "providerId")?;
    let provider_name = require(req.provider_name, "providerName")?;

    let kind = NotificationKind::ProviderRegistration {
        provider_id,
        provider_name,
    };

    dispatch_and_respond(&state, &user_id, kind).await
}

async fn trigger_document_status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DocumentStatusRequest>,
) -> Result<Json<TriggerResponse>, AppErrorWithDetails> {
    let user_id = require(req.user_id, "userId")?;
    let document_id = require(req.document_id, "documentId")?;
    let document_type = require(req.document_type, "documentType")?;
    let provider_name = require(req.provider_name, "providerName")?;
    let status = require(req.status, "status")?;
    let redirect_url = require(req.redirect_url, "redirectUrl")?;

    let kind = NotificationKind::DocumentStatus {
        document_id,
        document_type,
        provider_name,
        status,
        redirect_url,
    };

    dispatch_and_respond(&state, &user_id, kind).await
}

/// The record is stored before delivery is attempted, so the failure
/// responses below still leave the notification in history: the 404
/// reports a missing device token, the 500 carries the stored record in
/// its details.
async fn dispatch_and_respond(
    state: &Arc<AppState>,
    user_id: &str,
    kind: NotificationKind,
) -> Result<Json<TriggerResponse>, AppErrorWithDetails> {
    match state.dispatcher.dispatch(user_id, kind).await {
        DispatchOutcome::Delivered(notification) => Ok(Json(TriggerResponse {
            success: true,
            notification,
        })),
        DispatchOutcome::NoToken => {
            Err(AppError::NoDeviceToken(user_id.to_string()).into())
        }
        DispatchOutcome::StoredUndelivered { record, error } => Err(error.with_details(
            serde_json::json!({ "stored": true, "notification": record }),
        )),
    }
}

/// List a user's notification history, paginated and optionally filtered
/// by read state. The unread count always covers the full log.
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<Page>> {
    let page_query = PageQuery::new(
        query.page,
        query.limit,
        ReadFilter::from_query(query.status.as_deref()),
    );

    let log = state.store.snapshot(&user_id).await;

    Ok(Json(paginate(&log, &page_query)))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MarkReadRequest>,
) -> AppResult<Json<MarkReadResponse>> {
    let user_id = require(req.user_id, "userId")?;
    let notification_id = req.notification_id.ok_or_else(|| {
        AppError::BadRequest("Missing required field: notificationId".to_string())
    })?;

    match state.store.mark_read(&user_id, notification_id).await {
        MarkReadOutcome::Updated(notification) => Ok(Json(MarkReadResponse {
            success: true,
            notification,
        })),
        MarkReadOutcome::UnknownUser => Err(AppError::NotFound(format!(
            "No notifications for user {}",
            user_id
        ))),
        MarkReadOutcome::UnknownRecord => Err(AppError::NotFound(format!(
            "Notification {} not found for user {}",
            notification_id, user_id
        ))),
    }
}
