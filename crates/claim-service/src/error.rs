//! 活动服务错误类型定义
//!
//! 领取流程的错误从不让 Attempt 或 InventoryItem 停在半更新状态：
//! 分配和建档各自是原子单元，投递失败只是投递问题，不回滚已完成的分配。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// 活动服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    // 资源不存在（对用户只暴露笼统提示）
    #[error("机器人不存在或未激活")]
    BotNotFound,
    #[error("活动不存在或未激活: {0}")]
    CampaignNotFound(String),
    #[error("领取记录不存在: {0}")]
    AttemptNotFound(i64),
    #[error("用户不存在: {0}")]
    UserNotFound(i64),

    // 业务错误
    #[error("库存已领完: campaign_id={0}")]
    OutOfStock(i64),
    #[error("已领取过该活动")]
    AlreadyClaimed,
    #[error("前置活动未完成: {0:?}")]
    PrerequisiteUnmet(Vec<i32>),
    #[error("模板渲染失败: {0}")]
    Render(String),
    #[error("消息投递失败: {0}")]
    Delivery(String),

    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("缓存错误: {0}")]
    Cache(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ClaimError {
    /// 返回对应的 HTTP 状态码（管理接口用）
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BotNotFound
            | Self::CampaignNotFound(_)
            | Self::AttemptNotFound(_)
            | Self::UserNotFound(_) => StatusCode::NOT_FOUND,

            Self::OutOfStock(_) | Self::AlreadyClaimed => StatusCode::CONFLICT,
            Self::PrerequisiteUnmet(_) => StatusCode::CONFLICT,

            Self::Validation(_) => StatusCode::BAD_REQUEST,

            Self::Render(_) | Self::Delivery(_) | Self::Database(_) | Self::Cache(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BotNotFound => "BOT_NOT_FOUND",
            Self::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::AttemptNotFound(_) => "ATTEMPT_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::OutOfStock(_) => "OUT_OF_STOCK",
            Self::AlreadyClaimed => "ALREADY_CLAIMED",
            Self::PrerequisiteUnmet(_) => "PREREQUISITE_UNMET",
            Self::Render(_) => "RENDER_ERROR",
            Self::Delivery(_) => "DELIVERY_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ClaimError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志，防止信息泄露
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Cache(e) => {
                tracing::error!(error = %e, "缓存操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<giveaway_shared::error::GiveawayError> for ClaimError {
    fn from(err: giveaway_shared::error::GiveawayError) -> Self {
        use giveaway_shared::error::GiveawayError;
        match err {
            GiveawayError::Database(e) => Self::Database(e),
            GiveawayError::Redis(e) => Self::Cache(e.to_string()),
            GiveawayError::Validation(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ClaimError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ClaimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ClaimError::BotNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ClaimError::OutOfStock(1).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ClaimError::PrerequisiteUnmet(vec![1, 2]).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ClaimError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClaimError::Internal("oops".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ClaimError::AlreadyClaimed.error_code(), "ALREADY_CLAIMED");
        assert_eq!(ClaimError::OutOfStock(3).error_code(), "OUT_OF_STOCK");
        assert_eq!(
            ClaimError::Delivery("timeout".into()).error_code(),
            "DELIVERY_ERROR"
        );
    }

    #[test]
    fn test_from_shared_error() {
        let err: ClaimError =
            giveaway_shared::error::GiveawayError::Validation("bad field".into()).into();
        assert!(matches!(err, ClaimError::Validation(_)));
    }

    #[tokio::test]
    async fn test_system_errors_hide_internal_details() {
        let response = ClaimError::Internal("stack trace at module X".into()).into_response();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("读取响应体失败");
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        let message = body["message"].as_str().unwrap();

        assert!(!message.contains("stack trace"));
        assert!(message.contains("服务内部错误"));
    }
}
