//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use giveaway_shared::cache::Cache;
use giveaway_shared::database::Database;

use crate::repository::{
    AnswerRepository, AttemptRepository, AttemptRepositoryTrait, BotRepository, BotRepositoryTrait,
    CampaignRepository, ChatUserRepository, ChatUserRepositoryTrait, InventoryRepository,
    MessageLogRepository, MessageLogRepositoryTrait,
};
use crate::service::{
    ApprovalService, BroadcastService, ClaimEngine, FulfillmentDispatcher, Outbox,
};
use crate::session::RedisSessionStore;
use crate::telegram::MessageSender;

/// Axum 应用共享状态
///
/// 仓储与服务都以 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL 连接池（就绪探针用）
    pub db: Database,
    /// Redis 缓存客户端（就绪探针用）
    pub cache: Arc<Cache>,
    pub bots: Arc<dyn BotRepositoryTrait>,
    pub users: Arc<dyn ChatUserRepositoryTrait>,
    pub attempts: Arc<dyn AttemptRepositoryTrait>,
    pub message_log: Arc<dyn MessageLogRepositoryTrait>,
    pub outbox: Arc<Outbox>,
    pub engine: Arc<ClaimEngine>,
    pub approval: Arc<ApprovalService>,
    pub broadcast: Arc<BroadcastService>,
}

impl AppState {
    /// 组装全部仓储与服务
    pub fn build(db: Database, cache: Arc<Cache>, sender: Arc<dyn MessageSender>) -> Self {
        let pool = db.pool().clone();

        let bots: Arc<dyn BotRepositoryTrait> = Arc::new(BotRepository::new(pool.clone()));
        let users: Arc<dyn ChatUserRepositoryTrait> =
            Arc::new(ChatUserRepository::new(pool.clone()));
        let campaigns = Arc::new(CampaignRepository::new(pool.clone()));
        let attempts: Arc<dyn AttemptRepositoryTrait> =
            Arc::new(AttemptRepository::new(pool.clone()));
        let answers = Arc::new(AnswerRepository::new(pool.clone()));
        let inventory = Arc::new(InventoryRepository::new(pool.clone()));
        let message_log: Arc<dyn MessageLogRepositoryTrait> =
            Arc::new(MessageLogRepository::new(pool));

        let session = Arc::new(RedisSessionStore::new(cache.clone()));
        let outbox = Arc::new(Outbox::new(sender, message_log.clone()));

        let fulfillment = Arc::new(FulfillmentDispatcher::new(
            inventory.clone(),
            attempts.clone(),
            session.clone(),
            outbox.clone(),
        ));

        let engine = Arc::new(ClaimEngine::new(
            bots.clone(),
            users.clone(),
            campaigns.clone(),
            attempts.clone(),
            answers,
            session,
            outbox.clone(),
            fulfillment,
        ));

        let approval = Arc::new(ApprovalService::new(
            bots.clone(),
            users.clone(),
            campaigns,
            attempts.clone(),
            inventory,
            outbox.clone(),
        ));

        let broadcast = Arc::new(BroadcastService::new(
            bots.clone(),
            users.clone(),
            outbox.clone(),
        ));

        Self {
            db,
            cache,
            bots,
            users,
            attempts,
            message_log,
            outbox,
            engine,
            approval,
            broadcast,
        }
    }
}
