//! 领取记录仓储
//!
//! Attempt 是只追加的交互结果日志，创建后仅状态和追发标记会变化

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::traits::{AttemptRepositoryTrait, FollowUpDue};
use crate::error::Result;
use crate::models::{Attempt, AttemptStatus};

/// 领取记录仓储
pub struct AttemptRepository {
    pool: PgPool,
}

impl AttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRepositoryTrait for AttemptRepository {
    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>> {
        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            SELECT id, user_id, campaign_id, status, proof, admin_notes, follow_up_sent, created_at
            FROM attempts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn create_attempt<'a>(
        &self,
        user_id: i64,
        campaign_id: i64,
        status: AttemptStatus,
        proof: Option<&'a str>,
    ) -> Result<Attempt> {
        let attempt = sqlx::query_as::<_, Attempt>(
            r#"
            INSERT INTO attempts (user_id, campaign_id, status, proof, follow_up_sent, created_at)
            VALUES ($1, $2, $3, $4, false, NOW())
            RETURNING id, user_id, campaign_id, status, proof, admin_notes, follow_up_sent, created_at
            "#,
        )
        .bind(user_id)
        .bind(campaign_id)
        .bind(status)
        .bind(proof)
        .fetch_one(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn has_open_attempt(&self, user_id: i64, campaign_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM attempts
                WHERE user_id = $1 AND campaign_id = $2 AND status IN ('pending', 'approved')
            )
            "#,
        )
        .bind(user_id)
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn has_approved_attempt(&self, user_id: i64, campaign_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM attempts
                WHERE user_id = $1 AND campaign_id = $2 AND status = 'approved'
            )
            "#,
        )
        .bind(user_id)
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn set_status<'a>(
        &self,
        id: i64,
        status: AttemptStatus,
        admin_notes: Option<&'a str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE attempts
            SET status = $2, admin_notes = COALESCE($3, admin_notes)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(admin_notes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_due_follow_ups(&self, now: DateTime<Utc>) -> Result<Vec<FollowUpDue>> {
        let rows = sqlx::query_as::<_, FollowUpDueRow>(
            r#"
            SELECT a.id AS attempt_id, b.id AS bot_id, b.token AS bot_token,
                   u.id AS user_id, u.chat_id, c.follow_up_text
            FROM attempts a
            JOIN campaigns c ON c.id = a.campaign_id
            JOIN chat_users u ON u.id = a.user_id
            JOIN bots b ON b.id = c.bot_id
            WHERE a.status = 'approved'
              AND a.follow_up_sent = false
              AND c.follow_up_text IS NOT NULL
              AND length(trim(c.follow_up_text)) > 0
              AND c.follow_up_delay_secs IS NOT NULL
              AND a.created_at + make_interval(secs => c.follow_up_delay_secs) <= $1
            ORDER BY a.created_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FollowUpDueRow::into_due).collect())
    }

    async fn mark_follow_up_sent(&self, attempt_id: i64) -> Result<bool> {
        // 条件更新：标记已被置位时 rows_affected = 0，调用方据此发现重复扫描
        let result = sqlx::query(
            r#"
            UPDATE attempts
            SET follow_up_sent = true
            WHERE id = $1 AND follow_up_sent = false
            "#,
        )
        .bind(attempt_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// 追发查询的中间行
#[derive(sqlx::FromRow)]
struct FollowUpDueRow {
    attempt_id: i64,
    bot_id: i64,
    bot_token: String,
    user_id: i64,
    chat_id: String,
    follow_up_text: String,
}

impl FollowUpDueRow {
    fn into_due(self) -> FollowUpDue {
        FollowUpDue {
            attempt_id: self.attempt_id,
            bot_id: self.bot_id,
            bot_token: self.bot_token,
            user_id: self.user_id,
            chat_id: self.chat_id,
            follow_up_text: self.follow_up_text,
        }
    }
}
