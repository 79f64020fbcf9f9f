//! 会话状态存储
//!
//! 状态机跨消息共享的唯一状态。键按 chat 和用途双重限定，TTL 独立，
//! 互相之间没有事务保证；过期只是清理手段，任何键都可能静默消失，
//! 调用方必须把"缺失"当作合法状态处理（重新提示即可）。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use giveaway_shared::cache::{Cache, CacheKey};

use crate::error::Result;

/// 认领意向 / 手机号验证等待的保留时长
pub const CLAIM_INTENT_TTL: Duration = Duration::from_secs(600);
/// 问卷作答状态的保留时长
pub const QUESTIONNAIRE_TTL: Duration = Duration::from_secs(3600);
/// 重做确认等待的保留时长
pub const RESUME_CHOICE_TTL: Duration = Duration::from_secs(600);

/// 会话状态存储抽象
///
/// 注入状态机而非环境全局，每个方法对应一个独立的键
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 记录后续消息应解释为针对哪个活动
    async fn set_claim_intent(&self, chat_id: &str, campaign_id: i64, ttl: Duration) -> Result<()>;
    async fn claim_intent(&self, chat_id: &str) -> Result<Option<i64>>;
    async fn clear_claim_intent(&self, chat_id: &str) -> Result<()>;

    /// 当前等待回答的问题
    async fn set_current_question(&self, chat_id: &str, question_id: i64) -> Result<()>;
    async fn current_question(&self, chat_id: &str) -> Result<Option<i64>>;
    async fn clear_current_question(&self, chat_id: &str) -> Result<()>;

    /// 答题中标记：区分"问卷进行中"和"闲置但已有答案"
    async fn set_answering(&self, chat_id: &str) -> Result<()>;
    async fn is_answering(&self, chat_id: &str) -> Result<bool>;
    async fn clear_answering(&self, chat_id: &str) -> Result<()>;

    /// 等待 yes/no 重做确认的活动
    async fn set_resume_choice(&self, chat_id: &str, campaign_id: i64) -> Result<()>;
    async fn resume_choice(&self, chat_id: &str) -> Result<Option<i64>>;
    async fn clear_resume_choice(&self, chat_id: &str) -> Result<()>;

    /// 清空该 chat 的全部会话状态（完成或放弃时）
    async fn clear_all(&self, chat_id: &str) -> Result<()>;
}

/// Redis 实现
pub struct RedisSessionStore {
    cache: Arc<Cache>,
}

impl RedisSessionStore {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set_claim_intent(&self, chat_id: &str, campaign_id: i64, ttl: Duration) -> Result<()> {
        self.cache
            .set(&CacheKey::claim_intent(chat_id), &campaign_id, ttl)
            .await?;
        Ok(())
    }

    async fn claim_intent(&self, chat_id: &str) -> Result<Option<i64>> {
        Ok(self.cache.get(&CacheKey::claim_intent(chat_id)).await?)
    }

    async fn clear_claim_intent(&self, chat_id: &str) -> Result<()> {
        self.cache.delete(&CacheKey::claim_intent(chat_id)).await?;
        Ok(())
    }

    async fn set_current_question(&self, chat_id: &str, question_id: i64) -> Result<()> {
        self.cache
            .set(
                &CacheKey::current_question(chat_id),
                &question_id,
                QUESTIONNAIRE_TTL,
            )
            .await?;
        Ok(())
    }

    async fn current_question(&self, chat_id: &str) -> Result<Option<i64>> {
        Ok(self
            .cache
            .get(&CacheKey::current_question(chat_id))
            .await?)
    }

    async fn clear_current_question(&self, chat_id: &str) -> Result<()> {
        self.cache
            .delete(&CacheKey::current_question(chat_id))
            .await?;
        Ok(())
    }

    async fn set_answering(&self, chat_id: &str) -> Result<()> {
        self.cache
            .set(&CacheKey::answering(chat_id), &true, QUESTIONNAIRE_TTL)
            .await?;
        Ok(())
    }

    async fn is_answering(&self, chat_id: &str) -> Result<bool> {
        Ok(self
            .cache
            .get::<bool>(&CacheKey::answering(chat_id))
            .await?
            .unwrap_or(false))
    }

    async fn clear_answering(&self, chat_id: &str) -> Result<()> {
        self.cache.delete(&CacheKey::answering(chat_id)).await?;
        Ok(())
    }

    async fn set_resume_choice(&self, chat_id: &str, campaign_id: i64) -> Result<()> {
        self.cache
            .set(
                &CacheKey::resume_choice(chat_id),
                &campaign_id,
                RESUME_CHOICE_TTL,
            )
            .await?;
        Ok(())
    }

    async fn resume_choice(&self, chat_id: &str) -> Result<Option<i64>> {
        Ok(self.cache.get(&CacheKey::resume_choice(chat_id)).await?)
    }

    async fn clear_resume_choice(&self, chat_id: &str) -> Result<()> {
        self.cache.delete(&CacheKey::resume_choice(chat_id)).await?;
        Ok(())
    }

    async fn clear_all(&self, chat_id: &str) -> Result<()> {
        self.cache.delete(&CacheKey::claim_intent(chat_id)).await?;
        self.cache
            .delete(&CacheKey::current_question(chat_id))
            .await?;
        self.cache.delete(&CacheKey::answering(chat_id)).await?;
        self.cache.delete(&CacheKey::resume_choice(chat_id)).await?;
        Ok(())
    }
}
