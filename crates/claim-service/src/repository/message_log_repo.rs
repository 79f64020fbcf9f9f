//! 消息审计日志仓储
//!
//! 只追加的旁路观察者，不是正确性依赖

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::MessageLogRepositoryTrait;
use crate::error::Result;
use crate::models::MessageDirection;

/// 消息审计日志仓储
pub struct MessageLogRepository {
    pool: PgPool,
}

impl MessageLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageLogRepositoryTrait for MessageLogRepository {
    async fn append_log(
        &self,
        bot_id: i64,
        user_id: i64,
        direction: MessageDirection,
        content: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO message_logs (bot_id, user_id, direction, content, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(bot_id)
        .bind(user_id)
        .bind(direction)
        .bind(content)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
