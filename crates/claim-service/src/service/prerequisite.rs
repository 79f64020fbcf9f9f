//! 前置条件解析
//!
//! 活动可声明一个阈值：同机器人下所有 sequence <= 阈值的活跃活动
//! 必须先取得 approved 的领取记录。不支持任意依赖图，只有这一条链。

use std::sync::Arc;

use tracing::instrument;

use crate::error::Result;
use crate::models::Campaign;
use crate::repository::{AttemptRepositoryTrait, CampaignRepositoryTrait};

/// 前置条件解析器
pub struct PrerequisiteResolver {
    campaigns: Arc<dyn CampaignRepositoryTrait>,
    attempts: Arc<dyn AttemptRepositoryTrait>,
}

impl PrerequisiteResolver {
    pub fn new(
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        attempts: Arc<dyn AttemptRepositoryTrait>,
    ) -> Self {
        Self {
            campaigns,
            attempts,
        }
    }

    /// 计算未满足的前置活动编号，升序
    ///
    /// 阈值为空时直接返回空。否则枚举同机器人 sequence <= 阈值的活跃活动，
    /// 缺少 approved 记录的即为未满足。
    #[instrument(skip(self, campaign), fields(campaign_id = campaign.id))]
    pub async fn missing(&self, campaign: &Campaign, user_id: i64) -> Result<Vec<i32>> {
        let Some(threshold) = campaign.prerequisite_threshold else {
            return Ok(Vec::new());
        };

        let mut unmet = Vec::new();
        for candidate in self.campaigns.list_active(campaign.bot_id).await? {
            let Some(seq) = candidate.sequence else {
                continue;
            };
            if seq > threshold {
                continue;
            }
            if !self
                .attempts
                .has_approved_attempt(user_id, candidate.id)
                .await?
            {
                unmet.push(seq);
            }
        }

        unmet.sort_unstable();
        Ok(unmet)
    }
}

/// 把编号连成用户可读的列表："1"、"1 and 2"、"1, 2 and 3"
pub fn join_sequences(sequences: &[i32]) -> String {
    match sequences {
        [] => String::new(),
        [only] => only.to_string(),
        [head @ .., last] => {
            let head = head
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} and {}", head, last)
        }
    }
}
