//! 群发服务
//!
//! 管理端把一条消息发给机器人的全部用户，逐个调用出站发送并统计成功数。
//! 单个用户失败不影响其余用户。

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{ClaimError, Result};
use crate::repository::{BotRepositoryTrait, ChatUserRepositoryTrait};
use crate::service::dto::BroadcastResponse;
use crate::service::outbox::Outbox;

/// 群发服务
pub struct BroadcastService {
    bots: Arc<dyn BotRepositoryTrait>,
    users: Arc<dyn ChatUserRepositoryTrait>,
    outbox: Arc<Outbox>,
}

impl BroadcastService {
    pub fn new(
        bots: Arc<dyn BotRepositoryTrait>,
        users: Arc<dyn ChatUserRepositoryTrait>,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            bots,
            users,
            outbox,
        }
    }

    /// 向机器人的全部用户发送文本，返回 (目标数, 成功数)
    #[instrument(skip(self, text))]
    pub async fn broadcast(&self, bot_id: i64, text: &str) -> Result<BroadcastResponse> {
        let bot = self
            .bots
            .get_bot(bot_id)
            .await?
            .ok_or(ClaimError::BotNotFound)?;

        let users = self.users.list_users_by_bot(bot_id).await?;
        let total = users.len() as u64;
        let mut sent = 0u64;

        for user in &users {
            match self.outbox.send_to_user(&bot, user, text, None).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "群发单条失败，继续");
                }
            }
        }

        info!(bot_id, total, sent, "broadcast finished");
        Ok(BroadcastResponse { total, sent })
    }
}
