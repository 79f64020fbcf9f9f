//! 奖励发放调度
//!
//! 活动通过全部门槛后的最终一步。分派顺序沿用既定语义：
//! 标准活动先发共享内容；人工审核要求（到这里说明凭证尚未收取）重新
//! 提示提交凭证；唯一活动从库存原子领取一件。
//! 售罄时不建立领取记录：用户没拿到奖励就不欠一次完成。

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::{AttemptStatus, BotProfile, Campaign, CampaignKind, ChatUser, RequirementKind};
use crate::repository::{AttemptRepositoryTrait, InventoryRepositoryTrait};
use crate::service::dto::FulfillmentOutcome;
use crate::service::outbox::Outbox;
use crate::session::{CLAIM_INTENT_TTL, SessionStore};
use crate::telegram::ReplyMarkup;
use crate::template::{TemplateRenderer, TemplateVars};

/// 售罄提示
pub const OUT_OF_STOCK_NOTICE: &str = "⚠️ Sorry, we are out of stock right now!";
/// 凭证提示默认文案
pub const PROOF_PROMPT_DEFAULT: &str = "Please send your proof (screenshot/text) now.";
/// 唯一活动默认的发码文案
const UNIQUE_REWARD_DEFAULT: &str = "✅ Verified! Here is your code:\n{content}";

/// 奖励发放调度器
pub struct FulfillmentDispatcher {
    inventory: Arc<dyn InventoryRepositoryTrait>,
    attempts: Arc<dyn AttemptRepositoryTrait>,
    session: Arc<dyn SessionStore>,
    outbox: Arc<Outbox>,
    renderer: TemplateRenderer,
}

impl FulfillmentDispatcher {
    pub fn new(
        inventory: Arc<dyn InventoryRepositoryTrait>,
        attempts: Arc<dyn AttemptRepositoryTrait>,
        session: Arc<dyn SessionStore>,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            inventory,
            attempts,
            session,
            outbox,
            renderer: TemplateRenderer::new(),
        }
    }

    /// 发放奖励
    ///
    /// 投递失败不回滚任何已完成的写入：分配即所有权，发不出去是投递
    /// 问题，记录日志等待外围处理，领取记录照常建立。
    #[instrument(skip(self, bot, user, campaign), fields(campaign_id = campaign.id, user_id = user.id))]
    pub async fn fulfill(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<FulfillmentOutcome> {
        let outcome = match (campaign.kind, campaign.requirement) {
            // 标准活动：人人同一份内容，直接发
            (CampaignKind::Standard, _) => self.deliver_standard(bot, user, campaign).await?,

            // 唯一活动 + 人工审核：凭证尚未收取，重新提示而不是立即发放
            (CampaignKind::Unique, RequirementKind::ManualApproval) => {
                self.reprompt_proof(bot, user, campaign).await?
            }

            // 唯一活动：从库存领取
            (CampaignKind::Unique, _) => self.deliver_unique(bot, user, campaign).await?,
        };

        metrics::counter!("fulfillments_total", "result" => outcome_label(outcome)).increment(1);
        Ok(outcome)
    }

    async fn deliver_standard(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<FulfillmentOutcome> {
        let content = campaign.static_content.clone().unwrap_or_default();
        let vars = TemplateVars::new()
            .content(content)
            .name(user.display_name());
        let text = self.renderer.render_or_default(
            campaign.approval_message.as_deref(),
            "{content}",
            &vars,
        );

        let delivery = self
            .outbox
            .send_to_user(bot, user, &text, Some(ReplyMarkup::remove_keyboard()))
            .await;
        self.log_delivery_failure(delivery, user, campaign);

        self.attempts
            .create_attempt(user.id, campaign.id, AttemptStatus::Approved, None)
            .await?;

        info!(campaign_id = campaign.id, user_id = user.id, "标准奖励已发放");
        Ok(FulfillmentOutcome::Delivered)
    }

    async fn deliver_unique(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<FulfillmentOutcome> {
        let Some(item) = self.inventory.allocate(campaign.id, user.id).await? else {
            self.outbox
                .send_to_user(
                    bot,
                    user,
                    OUT_OF_STOCK_NOTICE,
                    Some(ReplyMarkup::remove_keyboard()),
                )
                .await
                .ok();
            info!(campaign_id = campaign.id, user_id = user.id, "库存已领完");
            return Ok(FulfillmentOutcome::OutOfStock);
        };

        let vars = TemplateVars::new()
            .content(item.content.clone())
            .name(user.display_name());
        let text = self.renderer.render_or_default(
            campaign.approval_message.as_deref(),
            UNIQUE_REWARD_DEFAULT,
            &vars,
        );

        let delivery = self
            .outbox
            .send_to_user(bot, user, &text, Some(ReplyMarkup::remove_keyboard()))
            .await;
        self.log_delivery_failure(delivery, user, campaign);

        self.attempts
            .create_attempt(user.id, campaign.id, AttemptStatus::Approved, None)
            .await?;

        info!(
            campaign_id = campaign.id,
            user_id = user.id,
            item_id = item.id,
            "唯一奖励已发放"
        );
        Ok(FulfillmentOutcome::Delivered)
    }

    async fn reprompt_proof(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<FulfillmentOutcome> {
        self.session
            .set_claim_intent(&user.chat_id, campaign.id, CLAIM_INTENT_TTL)
            .await?;

        let vars = TemplateVars::new().name(user.display_name());
        let text = self.renderer.render_or_default(
            campaign.prompt_message.as_deref(),
            PROOF_PROMPT_DEFAULT,
            &vars,
        );
        self.outbox.send_to_user(bot, user, &text, None).await?;

        Ok(FulfillmentOutcome::AwaitingProof)
    }

    /// 投递失败只记录，不中断发放（分配已是既成事实）
    fn log_delivery_failure(&self, result: Result<()>, user: &ChatUser, campaign: &Campaign) {
        if let Err(e) = result {
            error!(
                campaign_id = campaign.id,
                user_id = user.id,
                error = %e,
                "奖励消息投递失败，领取记录照常建立，待外围补发"
            );
        }
    }
}

fn outcome_label(outcome: FulfillmentOutcome) -> &'static str {
    match outcome {
        FulfillmentOutcome::Delivered => "delivered",
        FulfillmentOutcome::OutOfStock => "out_of_stock",
        FulfillmentOutcome::AwaitingProof => "awaiting_proof",
    }
}
