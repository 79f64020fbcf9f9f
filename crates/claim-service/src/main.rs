//! 活动领取服务入口
//!
//! 接收 Telegram webhook、驱动领取状态机、暴露管理端点、
//! 后台运行追发消息 Worker。

use std::sync::Arc;
use std::time::Duration;

use claim_service::state::AppState;
use claim_service::telegram::TelegramSender;
use claim_service::worker::FollowUpWorker;
use giveaway_shared::{cache::Cache, config::AppConfig, database::Database, observability};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 统一加载配置：config/{env}.toml + GIVEAWAY_* 环境变量
    let config = AppConfig::load("claim-service").unwrap_or_default();

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting claim-service on {}", config.server_addr());

    // 初始化基础设施
    let db = Database::connect(&config.database).await?;
    let cache = Arc::new(Cache::new(&config.redis)?);
    let sender = Arc::new(TelegramSender::new(&config.telegram)?);

    let state = AppState::build(db, cache, sender);

    // 启动追发消息 Worker
    let worker_attempts = state.attempts.clone();
    let worker_outbox = state.outbox.clone();
    let poll_interval = Duration::from_secs(config.worker.follow_up_poll_seconds);
    tokio::spawn(async move {
        let worker = FollowUpWorker::new(worker_attempts, worker_outbox, poll_interval);
        worker.run().await;
    });

    let app = claim_service::routes::app_routes()
        // 可观测性：请求级 tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM（K8s 停止 Pod）或 Ctrl+C 时，
    // 停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
