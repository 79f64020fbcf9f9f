//! 聊天用户仓储
//!
//! (bot_id, chat_id) 唯一，首次来消息时创建，资料变化时同步更新

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::ChatUserRepositoryTrait;
use crate::error::Result;
use crate::models::ChatUser;

/// 聊天用户仓储
pub struct ChatUserRepository {
    pool: PgPool,
}

impl ChatUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatUserRepositoryTrait for ChatUserRepository {
    async fn get_user(&self, id: i64) -> Result<Option<ChatUser>> {
        let user = sqlx::query_as::<_, ChatUser>(
            r#"
            SELECT id, bot_id, chat_id, username, first_name, phone_number, joined_at
            FROM chat_users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn upsert_user<'a>(
        &self,
        bot_id: i64,
        chat_id: &str,
        username: Option<&'a str>,
        first_name: Option<&'a str>,
    ) -> Result<ChatUser> {
        // 已存在时只刷新资料字段，手机号等既有数据保持不变
        let user = sqlx::query_as::<_, ChatUser>(
            r#"
            INSERT INTO chat_users (bot_id, chat_id, username, first_name, joined_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (bot_id, chat_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name
            RETURNING id, bot_id, chat_id, username, first_name, phone_number, joined_at
            "#,
        )
        .bind(bot_id)
        .bind(chat_id)
        .bind(username)
        .bind(first_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_phone_number(&self, user_id: i64, phone_number: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE chat_users SET phone_number = $2 WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(phone_number)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_users_by_bot(&self, bot_id: i64) -> Result<Vec<ChatUser>> {
        let users = sqlx::query_as::<_, ChatUser>(
            r#"
            SELECT id, bot_id, chat_id, username, first_name, phone_number, joined_at
            FROM chat_users
            WHERE bot_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
