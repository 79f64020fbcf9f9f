//! 答案仓储
//!
//! Answer 归属于 (用户, 问题)；活动问卷完成 = 活动下每个问题都有答案

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::traits::AnswerRepositoryTrait;
use crate::error::Result;
use crate::models::Answer;

/// 答案仓储
pub struct AnswerRepository {
    pool: PgPool,
}

impl AnswerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnswerRepositoryTrait for AnswerRepository {
    async fn answered_question_ids(&self, user_id: i64, campaign_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT a.question_id
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.user_id = $1 AND q.campaign_id = $2
            "#,
        )
        .bind(user_id)
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn latest_answer_at(
        &self,
        user_id: i64,
        campaign_id: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(a.answered_at)
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.user_id = $1 AND q.campaign_id = $2
            "#,
        )
        .bind(user_id)
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    async fn create_answer(&self, user_id: i64, question_id: i64, text: &str) -> Result<Answer> {
        let answer = sqlx::query_as::<_, Answer>(
            r#"
            INSERT INTO answers (user_id, question_id, text, answered_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, user_id, question_id, text, answered_at
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;

        Ok(answer)
    }

    async fn delete_answers_for_campaign(&self, user_id: i64, campaign_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM answers
            WHERE user_id = $1
              AND question_id IN (SELECT id FROM questions WHERE campaign_id = $2)
            "#,
        )
        .bind(user_id)
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
