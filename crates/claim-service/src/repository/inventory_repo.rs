//! 库存仓储
//!
//! 唯一活动的物品池。allocate 是整个系统里唯一存在正确性竞态的位置：
//! 必须通过条件更新（谓词 used = false）完成挑选和占用，
//! 不允许先查再写的两段式实现。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, instrument};

use super::traits::InventoryRepositoryTrait;
use crate::error::Result;
use crate::models::InventoryItem;

/// 库存仓储
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryRepositoryTrait for InventoryRepository {
    /// 原子领取一件未使用物品
    ///
    /// 子查询用 FOR UPDATE SKIP LOCKED 挑选候选行，外层 UPDATE 再以
    /// used = false 作谓词兜底，保证对同一行的并发更新只有一个生效；
    /// 争夺最后一件的 N 个调用中恰好一个拿到 RETURNING 行。
    #[instrument(skip(self))]
    async fn allocate(&self, campaign_id: i64, user_id: i64) -> Result<Option<InventoryItem>> {
        let item = sqlx::query_as::<_, InventoryItem>(
            r#"
            UPDATE inventory_items
            SET used = true, claimed_by = $2, claimed_at = NOW()
            WHERE id = (
                SELECT id FROM inventory_items
                WHERE campaign_id = $1 AND used = false
                ORDER BY id ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND used = false
            RETURNING id, campaign_id, content, used, claimed_by, claimed_at
            "#,
        )
        .bind(campaign_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match &item {
            Some(item) => {
                metrics::counter!("inventory_allocations_total", "result" => "allocated")
                    .increment(1);
                info!(
                    campaign_id,
                    user_id,
                    item_id = item.id,
                    "inventory item allocated"
                );
            }
            None => {
                metrics::counter!("inventory_allocations_total", "result" => "out_of_stock")
                    .increment(1);
            }
        }

        Ok(item)
    }

    async fn count_available(&self, campaign_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM inventory_items
            WHERE campaign_id = $1 AND used = false
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
