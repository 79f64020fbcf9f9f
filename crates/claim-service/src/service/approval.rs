//! 人工审批事务
//!
//! 管理员把 pending 记录改为 approved 时，从人工审核路径重新进入
//! 分配与渲染逻辑。状态变更无论发放结果如何都会持久化；
//! 库存耗尽必须以操作员可见的警告暴露出来，而不是中止保存。

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::error::{ClaimError, Result};
use crate::models::{AttemptStatus, CampaignKind};
use crate::repository::{
    AttemptRepositoryTrait, BotRepositoryTrait, CampaignRepositoryTrait, ChatUserRepositoryTrait,
    InventoryRepositoryTrait,
};
use crate::service::dto::ApproveAttemptResponse;
use crate::service::outbox::Outbox;
use crate::template::{TemplateRenderer, TemplateVars};

/// 审批通过的默认通知（唯一活动）
const APPROVED_UNIQUE_DEFAULT: &str =
    "✅ Congratulations! Your claim has been approved.\nHere is your code:\n{content}";
/// 审批通过的默认通知（标准活动）
const APPROVED_STANDARD_DEFAULT: &str = "✅ Congratulations! Your claim has been approved.\n{content}";

/// 人工审批服务
pub struct ApprovalService {
    bots: Arc<dyn BotRepositoryTrait>,
    users: Arc<dyn ChatUserRepositoryTrait>,
    campaigns: Arc<dyn CampaignRepositoryTrait>,
    attempts: Arc<dyn AttemptRepositoryTrait>,
    inventory: Arc<dyn InventoryRepositoryTrait>,
    outbox: Arc<Outbox>,
    renderer: TemplateRenderer,
}

impl ApprovalService {
    pub fn new(
        bots: Arc<dyn BotRepositoryTrait>,
        users: Arc<dyn ChatUserRepositoryTrait>,
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        attempts: Arc<dyn AttemptRepositoryTrait>,
        inventory: Arc<dyn InventoryRepositoryTrait>,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            bots,
            users,
            campaigns,
            attempts,
            inventory,
            outbox,
            renderer: TemplateRenderer::new(),
        }
    }

    /// 批准一条 pending 领取记录并发放奖励
    ///
    /// 重复调用是安全的：已是 approved 的记录直接返回并附警告，
    /// 不会二次分配库存。
    #[instrument(skip(self, admin_notes))]
    pub async fn approve_attempt(
        &self,
        attempt_id: i64,
        admin_notes: Option<&str>,
    ) -> Result<ApproveAttemptResponse> {
        let attempt = self
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or(ClaimError::AttemptNotFound(attempt_id))?;

        match attempt.status {
            AttemptStatus::Pending => {}
            AttemptStatus::Approved => {
                return Ok(ApproveAttemptResponse {
                    attempt_id,
                    approved: true,
                    reward_delivered: false,
                    warning: Some("Attempt is already approved; nothing was re-sent.".to_string()),
                });
            }
            AttemptStatus::Rejected => {
                return Err(ClaimError::Validation(format!(
                    "领取记录 {} 已被拒绝，不能再批准",
                    attempt_id
                )));
            }
        }

        let campaign = self
            .campaigns
            .get_campaign(attempt.campaign_id)
            .await?
            .ok_or_else(|| ClaimError::CampaignNotFound(attempt.campaign_id.to_string()))?;
        let user = self
            .users
            .get_user(attempt.user_id)
            .await?
            .ok_or(ClaimError::UserNotFound(attempt.user_id))?;
        let bot = self
            .bots
            .get_bot(campaign.bot_id)
            .await?
            .ok_or(ClaimError::BotNotFound)?;

        // 状态变更先落库：无论后续发放是否成功，审批结果都成立
        self.attempts
            .set_status(attempt_id, AttemptStatus::Approved, admin_notes)
            .await?;

        let mut warning: Option<String> = None;
        let mut reward_delivered = false;

        match campaign.kind {
            CampaignKind::Unique => {
                match self.inventory.allocate(campaign.id, user.id).await? {
                    Some(item) => {
                        let vars = TemplateVars::new()
                            .content(item.content.clone())
                            .name(user.display_name());
                        let text = self.renderer.render_or_default(
                            campaign.approval_message.as_deref(),
                            APPROVED_UNIQUE_DEFAULT,
                            &vars,
                        );

                        match self.outbox.send_to_user(&bot, &user, &text, None).await {
                            Ok(()) => {
                                reward_delivered = true;
                                info!(attempt_id, item_id = item.id, "审批通过，兑换码已发出");
                            }
                            Err(e) => {
                                // 物品已归属用户；发送失败只是投递问题
                                error!(attempt_id, item_id = item.id, error = %e, "审批通过但投递失败");
                                warning = Some(format!(
                                    "Code {} is bound to the user but delivery failed: {}",
                                    item.id, e
                                ));
                            }
                        }
                    }
                    None => {
                        warn!(attempt_id, campaign_id = campaign.id, "库存耗尽，审批仍已保存");
                        warning = Some(
                            "NO ITEMS LEFT! User was NOT sent a code. \
                             Status saved as approved regardless."
                                .to_string(),
                        );
                    }
                }
            }
            CampaignKind::Standard => {
                let vars = TemplateVars::new()
                    .content(campaign.static_content.clone().unwrap_or_default())
                    .name(user.display_name());
                let text = self.renderer.render_or_default(
                    campaign.approval_message.as_deref(),
                    APPROVED_STANDARD_DEFAULT,
                    &vars,
                );

                match self.outbox.send_to_user(&bot, &user, &text, None).await {
                    Ok(()) => {
                        reward_delivered = true;
                        info!(attempt_id, "审批通过，共享内容已发出");
                    }
                    Err(e) => {
                        error!(attempt_id, error = %e, "审批通过但投递失败");
                        warning = Some(format!("Content delivery failed: {}", e));
                    }
                }
            }
        }

        Ok(ApproveAttemptResponse {
            attempt_id,
            approved: true,
            reward_delivered,
            warning,
        })
    }
}
