//! 出站消息出口
//!
//! 发送 + 审计日志的组合出口。审计是旁路观察：日志写入失败只告警，
//! 不影响发送结果；发送失败原样返回给调用方决定如何处理。

use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::models::{BotProfile, ChatUser, MessageDirection};
use crate::repository::MessageLogRepositoryTrait;
use crate::telegram::{MessageSender, ReplyMarkup};

/// 出站消息出口
pub struct Outbox {
    sender: Arc<dyn MessageSender>,
    message_log: Arc<dyn MessageLogRepositoryTrait>,
}

impl Outbox {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        message_log: Arc<dyn MessageLogRepositoryTrait>,
    ) -> Self {
        Self {
            sender,
            message_log,
        }
    }

    /// 发给已知用户，成功后记审计日志
    pub async fn send_to_user(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<()> {
        self.send_to_chat(&bot.token, bot.id, user.id, &user.chat_id, text, reply_markup)
            .await
    }

    /// 发给指定 chat（worker 等持有扁平上下文的调用方）
    pub async fn send_to_chat(
        &self,
        bot_token: &str,
        bot_id: i64,
        user_id: i64,
        chat_id: &str,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<()> {
        self.sender
            .send(bot_token, chat_id, text, reply_markup)
            .await?;

        if let Err(e) = self
            .message_log
            .append_log(bot_id, user_id, MessageDirection::Outbound, text)
            .await
        {
            warn!(user_id, error = %e, "出站消息审计日志写入失败");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaimError;
    use crate::repository::MockMessageLogRepositoryTrait;
    use crate::telegram::MockMessageSender;

    #[tokio::test]
    async fn test_send_success_appends_audit_log() {
        let mut sender = MockMessageSender::new();
        sender.expect_send().times(1).returning(|_, _, _, _| Ok(()));

        let mut log = MockMessageLogRepositoryTrait::new();
        log.expect_append_log()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outbox = Outbox::new(Arc::new(sender), Arc::new(log));
        outbox
            .send_to_chat("token", 1, 2, "42", "hello", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_skips_audit_log() {
        let mut sender = MockMessageSender::new();
        sender
            .expect_send()
            .times(1)
            .returning(|_, _, _, _| Err(ClaimError::Delivery("down".into())));

        let mut log = MockMessageLogRepositoryTrait::new();
        log.expect_append_log().times(0);

        let outbox = Outbox::new(Arc::new(sender), Arc::new(log));
        let result = outbox.send_to_chat("token", 1, 2, "42", "hello", None).await;
        assert!(matches!(result, Err(ClaimError::Delivery(_))));
    }

    #[tokio::test]
    async fn test_audit_log_failure_does_not_fail_send() {
        let mut sender = MockMessageSender::new();
        sender.expect_send().times(1).returning(|_, _, _, _| Ok(()));

        let mut log = MockMessageLogRepositoryTrait::new();
        log.expect_append_log()
            .times(1)
            .returning(|_, _, _, _| Err(ClaimError::Internal("log table gone".into())));

        let outbox = Outbox::new(Arc::new(sender), Arc::new(log));
        assert!(
            outbox
                .send_to_chat("token", 1, 2, "42", "hello", None)
                .await
                .is_ok()
        );
    }
}
