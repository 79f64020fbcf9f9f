//! 机器人仓储
//!
//! 提供机器人档案和新闻公告的数据访问

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::BotRepositoryTrait;
use crate::error::Result;
use crate::models::{BotProfile, NewsPost};

/// 机器人仓储
pub struct BotRepository {
    pool: PgPool,
}

impl BotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BotRepositoryTrait for BotRepository {
    async fn get_bot(&self, id: i64) -> Result<Option<BotProfile>> {
        let bot = sqlx::query_as::<_, BotProfile>(
            r#"
            SELECT id, name, username, token, start_message_header, is_active, created_at
            FROM bots
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bot)
    }

    async fn get_active_by_token(&self, token: &str) -> Result<Option<BotProfile>> {
        let bot = sqlx::query_as::<_, BotProfile>(
            r#"
            SELECT id, name, username, token, start_message_header, is_active, created_at
            FROM bots
            WHERE token = $1 AND is_active = true
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bot)
    }

    async fn latest_news(&self, bot_id: i64) -> Result<Option<NewsPost>> {
        let news = sqlx::query_as::<_, NewsPost>(
            r#"
            SELECT id, bot_id, title, body, sent_at
            FROM news_posts
            WHERE bot_id = $1
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(news)
    }
}
