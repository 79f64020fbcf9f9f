//! 路由定义

use axum::Json;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use crate::handlers::{admin, webhook};
use crate::state::AppState;

/// 组装全部路由
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/webhook/{token}", post(webhook::telegram_webhook))
        .nest("/api/admin", admin_routes())
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/attempts/{id}/approve", post(admin::approve_attempt))
        .route("/broadcast", post(admin::broadcast))
}

/// 存活探针：服务进程正常即返回 ok
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "claim-service"
    }))
}

/// 就绪探针：检查数据库和 Redis 连接是否可用
async fn readiness_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = state.db.health_check().await.is_ok();
    let cache_ok = state.cache.health_check().await.is_ok();
    let all_ok = db_ok && cache_ok;

    Json(json!({
        "status": if all_ok { "ok" } else { "degraded" },
        "service": "claim-service",
        "checks": {
            "database": if db_ok { "ok" } else { "fail" },
            "redis": if cache_ok { "ok" } else { "fail" }
        }
    }))
}
