//! 活动仓储
//!
//! 提供活动和问卷问题的数据访问

use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::CampaignRepositoryTrait;
use crate::error::Result;
use crate::models::{Campaign, Question};

const CAMPAIGN_COLUMNS: &str = r#"
    id, bot_id, title, description, kind, requirement,
    sequence, prerequisite_threshold, allow_retake, static_content,
    approval_message, failure_message, prompt_message, success_message,
    follow_up_text, follow_up_delay_secs, is_active, created_at
"#;

/// 活动仓储
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepositoryTrait for CampaignRepository {
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn get_active_by_sequence(&self, bot_id: i64, sequence: i32) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS} FROM campaigns
            WHERE bot_id = $1 AND sequence = $2 AND is_active = true
            "#
        ))
        .bind(bot_id)
        .bind(sequence)
        .fetch_optional(&self.pool)
        .await?;

        Ok(campaign)
    }

    async fn list_active(&self, bot_id: i64) -> Result<Vec<Campaign>> {
        let campaigns = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS} FROM campaigns
            WHERE bot_id = $1 AND is_active = true
            ORDER BY sequence ASC NULLS LAST, id ASC
            "#
        ))
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(campaigns)
    }

    async fn list_questions(&self, campaign_id: i64) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, campaign_id, text, position
            FROM questions
            WHERE campaign_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }
}
