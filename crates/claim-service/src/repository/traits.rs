//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    Answer, Attempt, AttemptStatus, BotProfile, Campaign, ChatUser, InventoryItem,
    MessageDirection, NewsPost, Question,
};

/// 机器人仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotRepositoryTrait: Send + Sync {
    async fn get_bot(&self, id: i64) -> Result<Option<BotProfile>>;
    /// 按 token 查找活跃机器人（webhook 入口的身份识别）
    async fn get_active_by_token(&self, token: &str) -> Result<Option<BotProfile>>;
    /// 最新一条新闻公告
    async fn latest_news(&self, bot_id: i64) -> Result<Option<NewsPost>>;
}

/// 聊天用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatUserRepositoryTrait: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<ChatUser>>;
    /// 按 (bot, chat) 取出用户，不存在则创建；资料变化时同步更新
    async fn upsert_user<'a>(
        &self,
        bot_id: i64,
        chat_id: &str,
        username: Option<&'a str>,
        first_name: Option<&'a str>,
    ) -> Result<ChatUser>;
    async fn set_phone_number(&self, user_id: i64, phone_number: &str) -> Result<()>;
    async fn list_users_by_bot(&self, bot_id: i64) -> Result<Vec<ChatUser>>;
}

/// 活动仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepositoryTrait: Send + Sync {
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>>;
    /// 按展示编号查找活跃活动
    async fn get_active_by_sequence(&self, bot_id: i64, sequence: i32) -> Result<Option<Campaign>>;
    /// 机器人的全部活跃活动，按 sequence 升序（无编号的排在最后）
    async fn list_active(&self, bot_id: i64) -> Result<Vec<Campaign>>;
    /// 活动的问卷问题，按 position 升序
    async fn list_questions(&self, campaign_id: i64) -> Result<Vec<Question>>;
}

/// 库存仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryRepositoryTrait: Send + Sync {
    /// 原子领取一件未使用物品
    ///
    /// 必须以条件更新的方式实现：N 个并发调用争夺最后一件时，
    /// 恰好一个返回 Some，其余观察到 None（售罄）。
    async fn allocate(&self, campaign_id: i64, user_id: i64) -> Result<Option<InventoryItem>>;
    /// 剩余未使用数量
    async fn count_available(&self, campaign_id: i64) -> Result<i64>;
}

/// 待追发消息的查询投影
///
/// 关联了发送所需的全部上下文，避免 worker 再逐条回查
#[derive(Debug, Clone)]
pub struct FollowUpDue {
    pub attempt_id: i64,
    pub bot_id: i64,
    pub bot_token: String,
    pub user_id: i64,
    pub chat_id: String,
    pub follow_up_text: String,
}

/// 领取记录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptRepositoryTrait: Send + Sync {
    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>>;
    async fn create_attempt<'a>(
        &self,
        user_id: i64,
        campaign_id: i64,
        status: AttemptStatus,
        proof: Option<&'a str>,
    ) -> Result<Attempt>;
    /// 是否存在 pending/approved 的记录（阻止重复领取）
    async fn has_open_attempt(&self, user_id: i64, campaign_id: i64) -> Result<bool>;
    /// 是否存在 approved 的记录（前置条件判定）
    async fn has_approved_attempt(&self, user_id: i64, campaign_id: i64) -> Result<bool>;
    async fn set_status<'a>(
        &self,
        id: i64,
        status: AttemptStatus,
        admin_notes: Option<&'a str>,
    ) -> Result<()>;
    /// 到期且未追发的已通过记录
    async fn list_due_follow_ups(&self, now: DateTime<Utc>) -> Result<Vec<FollowUpDue>>;
    /// 条件置位追发标记；返回 false 表示标记已被置位（本次扫描不应计数）
    async fn mark_follow_up_sent(&self, attempt_id: i64) -> Result<bool>;
}

/// 答案仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnswerRepositoryTrait: Send + Sync {
    /// 用户在该活动下已回答的问题 id
    async fn answered_question_ids(&self, user_id: i64, campaign_id: i64) -> Result<Vec<i64>>;
    /// 用户在该活动下最近一次作答时间
    async fn latest_answer_at(
        &self,
        user_id: i64,
        campaign_id: i64,
    ) -> Result<Option<DateTime<Utc>>>;
    async fn create_answer(&self, user_id: i64, question_id: i64, text: &str) -> Result<Answer>;
    /// 删除用户在该活动下的全部答案（重做），返回删除条数
    async fn delete_answers_for_campaign(&self, user_id: i64, campaign_id: i64) -> Result<u64>;
}

/// 消息审计日志仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageLogRepositoryTrait: Send + Sync {
    /// 追加一条消息日志；只作旁路观察，失败不影响主流程
    async fn append_log(
        &self,
        bot_id: i64,
        user_id: i64,
        direction: MessageDirection,
        content: &str,
    ) -> Result<()>;
}
