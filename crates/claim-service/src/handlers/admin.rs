//! 管理端点
//!
//! 审批和群发。dashboard 本体在别处，这里只暴露核心必须可重入支持的操作。

use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;
use validator::Validate;

use crate::error::Result;
use crate::service::dto::{ApproveAttemptRequest, BroadcastRequest};
use crate::state::AppState;

/// POST /api/admin/attempts/{id}/approve
pub async fn approve_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
    Json(request): Json<ApproveAttemptRequest>,
) -> Result<Json<serde_json::Value>> {
    request.validate()?;

    let response = state
        .approval
        .approve_attempt(attempt_id, request.notes.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "code": "OK",
        "message": response.warning.clone().unwrap_or_else(|| "approved".to_string()),
        "data": response
    })))
}

/// POST /api/admin/broadcast
pub async fn broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<serde_json::Value>> {
    request.validate()?;

    let response = state
        .broadcast
        .broadcast(request.bot_id, &request.text)
        .await?;

    Ok(Json(json!({
        "success": true,
        "code": "OK",
        "message": format!("sent {}/{}", response.sent, response.total),
        "data": response
    })))
}
