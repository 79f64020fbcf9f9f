//! 领取流程状态机
//!
//! 每个 (chat, 活动) 的会话式流程控制器：判定"这个用户接下来要做什么"，
//! 分派四种领取要求，处理重做/续答的歧义，最终调用奖励发放。
//!
//! ## 状态一览（按会话键区分）
//!
//! - Idle：无会话状态，等待领取指令
//! - AwaitingProof：claim_intent 已设置，等待凭证消息
//! - AwaitingQuestionAnswer：claim_intent + current_question + answering
//! - AwaitingResumeChoice：resume_choice 已设置，等待 yes/no
//! - AwaitingPhone：claim_intent 已设置，等待联系人分享
//! - Completion：调用发放调度并清空会话键
//!
//! 任何会话键都可能已过期：缺失一律按 Idle 的对应分支处理（重新提示），
//! 这是幂等且安全的回退。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::{AttemptStatus, BotProfile, Campaign, ChatUser, RequirementKind};
use crate::repository::{
    AnswerRepositoryTrait, AttemptRepositoryTrait, BotRepositoryTrait, CampaignRepositoryTrait,
    ChatUserRepositoryTrait,
};
use crate::service::dto::FulfillmentOutcome;
use crate::service::fulfillment::{FulfillmentDispatcher, PROOF_PROMPT_DEFAULT};
use crate::service::outbox::Outbox;
use crate::service::prerequisite::{PrerequisiteResolver, join_sequences};
use crate::session::{CLAIM_INTENT_TTL, QUESTIONNAIRE_TTL, SessionStore};
use crate::telegram::{IncomingMessage, ReplyMarkup};
use crate::template::{TemplateRenderer, TemplateVars};

/// 重做宽限窗口（秒）
///
/// 最近一次作答距今不超过该值时，重复的领取指令被当作刚完成流程的
/// 竞态/重试，直接走发放；超过则认为用户是有意重来。可调常量，
/// 不是协议值。
pub const RETAKE_GRACE_SECS: i64 = 15;

/// 凭证收到后的默认回执
const PROOF_RECEIVED_DEFAULT: &str = "Proof received! An admin will verify shortly.";
/// 重做确认提示
const RESUME_CHOICE_PROMPT: &str =
    "You have already answered this questionnaire. Update previous answers? (yes/no)";

/// 领取流程状态机
pub struct ClaimEngine {
    bots: Arc<dyn BotRepositoryTrait>,
    users: Arc<dyn ChatUserRepositoryTrait>,
    campaigns: Arc<dyn CampaignRepositoryTrait>,
    attempts: Arc<dyn AttemptRepositoryTrait>,
    answers: Arc<dyn AnswerRepositoryTrait>,
    session: Arc<dyn SessionStore>,
    outbox: Arc<Outbox>,
    prerequisites: PrerequisiteResolver,
    fulfillment: Arc<FulfillmentDispatcher>,
    renderer: TemplateRenderer,
}

impl ClaimEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bots: Arc<dyn BotRepositoryTrait>,
        users: Arc<dyn ChatUserRepositoryTrait>,
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        attempts: Arc<dyn AttemptRepositoryTrait>,
        answers: Arc<dyn AnswerRepositoryTrait>,
        session: Arc<dyn SessionStore>,
        outbox: Arc<Outbox>,
        fulfillment: Arc<FulfillmentDispatcher>,
    ) -> Self {
        let prerequisites = PrerequisiteResolver::new(campaigns.clone(), attempts.clone());
        Self {
            bots,
            users,
            campaigns,
            attempts,
            answers,
            session,
            outbox,
            prerequisites,
            fulfillment,
            renderer: TemplateRenderer::new(),
        }
    }

    /// 解析领取指令
    ///
    /// 接受 `/claim_3`、`3`、`3 随附凭证文字` 三种形式；
    /// 返回 (活动编号, 行内凭证)。
    pub fn parse_claim_command(text: &str) -> Option<(i32, Option<String>)> {
        if let Some(rest) = text.strip_prefix("/claim_") {
            return rest.parse::<i32>().ok().map(|seq| (seq, None));
        }

        let mut parts = text.split_whitespace();
        let seq = parts.next()?.parse::<i32>().ok()?;
        let proof = parts.collect::<Vec<_>>().join(" ");
        let proof = (!proof.is_empty()).then_some(proof);
        Some((seq, proof))
    }

    /// /start：欢迎语 + 最新公告 + 活动列表
    #[instrument(skip(self, bot, user), fields(bot_id = bot.id, user_id = user.id))]
    pub async fn handle_start(&self, bot: &BotProfile, user: &ChatUser) -> Result<()> {
        let campaigns: Vec<Campaign> = self
            .campaigns
            .list_active(bot.id)
            .await?
            .into_iter()
            .filter(|c| c.sequence.is_some())
            .collect();
        let news = self.bots.latest_news(bot.id).await?;

        info!(
            bot = %bot.username,
            user = user.display_name(),
            count = campaigns.len(),
            "handling /start"
        );

        let mut msg = format!("👋 Welcome {}!\n\n", user.display_name());

        if let Some(news) = news {
            msg.push_str(&format!("📰 Latest News: {}\n{}\n\n", news.title, news.body));
        }

        if campaigns.is_empty() {
            warn!(bot = %bot.username, "no active giveaways found");
            msg.push_str("No active giveaways at the moment.");
        } else {
            msg.push_str(&format!("{}\n\n", bot.start_message_header));
            for campaign in &campaigns {
                if let Some(line) = campaign.display_line() {
                    msg.push_str(&format!("{}\n\n", line));
                }
            }
        }

        self.outbox.send_to_user(bot, user, &msg, None).await
    }

    /// 领取指令入口
    #[instrument(skip(self, bot, user, text), fields(bot_id = bot.id, user_id = user.id))]
    pub async fn handle_claim_command(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        text: &str,
    ) -> Result<()> {
        metrics::counter!("claims_total").increment(1);

        let Some((sequence, inline_proof)) = Self::parse_claim_command(text) else {
            // 编号解析失败：与未知活动同样处理
            self.outbox
                .send_to_user(bot, user, "Giveaway not found or inactive.", None)
                .await?;
            return Ok(());
        };

        let Some(campaign) = self
            .campaigns
            .get_active_by_sequence(bot.id, sequence)
            .await?
        else {
            self.outbox
                .send_to_user(bot, user, "Giveaway not found or inactive.", None)
                .await?;
            return Ok(());
        };

        self.claim_campaign(bot, user, &campaign, inline_proof.as_deref())
            .await
    }

    /// 状态机主步骤：针对一个活动推进领取流程
    ///
    /// 校验阶梯依次是：前置条件 -> 重复领取/重做判定 -> 按要求分派。
    /// 每个早退分支都会给用户一条消息，流程绝不静默卡住。
    #[instrument(skip(self, bot, user, campaign, inline_proof), fields(campaign_id = campaign.id, user_id = user.id))]
    pub async fn claim_campaign(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
        inline_proof: Option<&str>,
    ) -> Result<()> {
        // 1. 前置条件
        let missing = self.prerequisites.missing(campaign, user.id).await?;
        if !missing.is_empty() {
            self.send_prerequisite_failure(bot, user, campaign, &missing)
                .await?;
            return Ok(());
        }

        // 2. 已有 pending/approved 记录时的重做判定
        if self.attempts.has_open_attempt(user.id, campaign.id).await? {
            if !campaign.allow_retake {
                self.outbox
                    .send_to_user(
                        bot,
                        user,
                        "✅ You have already claimed this giveaway.",
                        Some(ReplyMarkup::remove_keyboard()),
                    )
                    .await?;
                return Ok(());
            }

            // 宽限窗口判定只在非答题中才有意义；答题中直接落入分派续问
            if !self.session.is_answering(&user.chat_id).await? {
                if let Some(last) = self.answers.latest_answer_at(user.id, campaign.id).await? {
                    let age_secs = (Utc::now() - last).num_seconds();
                    if age_secs > RETAKE_GRACE_SECS {
                        if self.questionnaire_fully_answered(user.id, campaign).await? {
                            // 答案齐全：销毁前先让用户确认
                            return self.prompt_resume_choice(bot, user, campaign).await;
                        }
                        // 半途而废的旧流程：清掉重来
                        self.reset_questionnaire(user, campaign).await?;
                    }
                    // 窗口内：刚完成流程的重复投递，落入分派直达发放
                }
            }
        }

        // 3. 按要求分派
        match campaign.requirement {
            RequirementKind::ManualApproval => {
                self.dispatch_manual_approval(bot, user, campaign, inline_proof)
                    .await
            }
            RequirementKind::Questionnaire => self.advance_questionnaire(bot, user, campaign).await,
            RequirementKind::PhoneNumber => self.dispatch_phone_number(bot, user, campaign).await,
            RequirementKind::None => self.complete(bot, user, campaign).await,
        }
    }

    /// 非指令消息入口：重做确认、问卷答案、人工审核凭证
    #[instrument(skip(self, bot, user, message), fields(bot_id = bot.id, user_id = user.id))]
    pub async fn handle_inbound(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        message: &IncomingMessage,
    ) -> Result<()> {
        // AwaitingResumeChoice 优先于其他解释
        if let Some(campaign_id) = self.session.resume_choice(&user.chat_id).await? {
            return self
                .handle_resume_reply(bot, user, campaign_id, message)
                .await;
        }

        // 解析目标活动：先看认领意向，其次按顺序自动探测
        let campaign = match self.session.claim_intent(&user.chat_id).await? {
            Some(id) => self
                .campaigns
                .get_campaign(id)
                .await?
                .filter(|c| c.is_active),
            None => None,
        };
        let campaign = match campaign {
            Some(c) => c,
            None => match self.find_target_campaign(bot, user).await? {
                Some(c) => c,
                None => {
                    self.outbox
                        .send_to_user(
                            bot,
                            user,
                            "We've received your message, but it doesn't seem to be for a specific giveaway.",
                            None,
                        )
                        .await?;
                    return Ok(());
                }
            },
        };

        // 自动探测来的目标也必须重新过前置条件
        let missing = self.prerequisites.missing(&campaign, user.id).await?;
        if !missing.is_empty() {
            self.send_prerequisite_failure(bot, user, &campaign, &missing)
                .await?;
            return Ok(());
        }

        match campaign.requirement {
            RequirementKind::Questionnaire => {
                self.record_answer(bot, user, &campaign, message).await
            }
            RequirementKind::ManualApproval => {
                self.record_proof(bot, user, &campaign, message).await
            }
            other => {
                self.outbox
                    .send_to_user(
                        bot,
                        user,
                        &format!(
                            "⚠️ Giveaway '{}' requires a different claim method ({}).",
                            campaign.title,
                            other.as_str()
                        ),
                        None,
                    )
                    .await?;
                Ok(())
            }
        }
    }

    /// 联系人分享入口（手机号验证）
    #[instrument(skip(self, bot, user, phone_number), fields(user_id = user.id))]
    pub async fn handle_contact(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        phone_number: &str,
    ) -> Result<()> {
        self.users.set_phone_number(user.id, phone_number).await?;

        self.outbox
            .send_to_user(
                bot,
                user,
                "✅ Phone Number Verified!",
                Some(ReplyMarkup::remove_keyboard()),
            )
            .await?;

        // 有等待中的认领意向则继续流程
        let Some(campaign_id) = self.session.claim_intent(&user.chat_id).await? else {
            return Ok(());
        };
        let Some(campaign) = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .filter(|c| c.is_active)
        else {
            return Ok(());
        };

        // 意向活动必须确实要求手机号（防止把别的流程短路掉）
        if campaign.requirement != RequirementKind::PhoneNumber {
            return Ok(());
        }

        self.session.clear_claim_intent(&user.chat_id).await?;

        let mut verified = user.clone();
        verified.phone_number = Some(phone_number.to_string());
        self.complete(bot, &verified, &campaign).await
    }

    // ==================== 分派分支 ====================

    async fn dispatch_manual_approval(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
        inline_proof: Option<&str>,
    ) -> Result<()> {
        match inline_proof.filter(|p| !p.trim().is_empty()) {
            Some(proof) => {
                // 指令里直接带了凭证："3 我的凭证"
                self.attempts
                    .create_attempt(user.id, campaign.id, AttemptStatus::Pending, Some(proof))
                    .await?;

                let vars = TemplateVars::new().name(user.display_name());
                let text = self.renderer.render_or_default(
                    campaign.success_message.as_deref(),
                    PROOF_RECEIVED_DEFAULT,
                    &vars,
                );
                self.outbox.send_to_user(bot, user, &text, None).await
            }
            None => {
                self.session
                    .set_claim_intent(&user.chat_id, campaign.id, CLAIM_INTENT_TTL)
                    .await?;

                let vars = TemplateVars::new().name(user.display_name());
                let text = self.renderer.render_or_default(
                    campaign.prompt_message.as_deref(),
                    PROOF_PROMPT_DEFAULT,
                    &vars,
                );
                self.outbox.send_to_user(bot, user, &text, None).await
            }
        }
    }

    /// 问卷推进：在一次状态机步骤内扫描未答问题
    async fn advance_questionnaire(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<()> {
        let questions = self.campaigns.list_questions(campaign.id).await?;
        if questions.is_empty() {
            // 没配问题的问卷活动直接发放
            return self.complete(bot, user, campaign).await;
        }

        let answered: HashSet<i64> = self
            .answers
            .answered_question_ids(user.id, campaign.id)
            .await?
            .into_iter()
            .collect();

        let next = questions.iter().find(|q| !answered.contains(&q.id));

        match next {
            Some(question) => {
                self.session
                    .set_claim_intent(&user.chat_id, campaign.id, QUESTIONNAIRE_TTL)
                    .await?;
                self.session
                    .set_current_question(&user.chat_id, question.id)
                    .await?;
                self.session.set_answering(&user.chat_id).await?;

                self.outbox
                    .send_to_user(bot, user, &format!("📝 Question: {}", question.text), None)
                    .await
            }
            None => {
                // 全部答完：区分"刚答完"和"旧答案躺着"
                if self.session.is_answering(&user.chat_id).await? {
                    return self.finish_questionnaire(bot, user, campaign).await;
                }

                let last = self.answers.latest_answer_at(user.id, campaign.id).await?;
                match last {
                    Some(last) if (Utc::now() - last).num_seconds() > RETAKE_GRACE_SECS => {
                        self.prompt_resume_choice(bot, user, campaign).await
                    }
                    // 窗口内（或没有可比时间）：当作刚完成的流程，直接发放
                    _ => self.finish_questionnaire(bot, user, campaign).await,
                }
            }
        }
    }

    async fn dispatch_phone_number(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<()> {
        if user.phone_number.is_some() {
            return self.complete(bot, user, campaign).await;
        }

        self.session
            .set_claim_intent(&user.chat_id, campaign.id, CLAIM_INTENT_TTL)
            .await?;

        self.outbox
            .send_to_user(
                bot,
                user,
                "⚠️ This giveaway requires a mobile number to minimize spam.\nPlease tap the button below to verify your number.",
                Some(ReplyMarkup::contact_request()),
            )
            .await
    }

    // ==================== 入站消息分支 ====================

    /// AwaitingResumeChoice 的回复："yes" 清答案重来，其余视为继续发放
    async fn handle_resume_reply(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign_id: i64,
        message: &IncomingMessage,
    ) -> Result<()> {
        self.session.clear_resume_choice(&user.chat_id).await?;

        let Some(campaign) = self
            .campaigns
            .get_campaign(campaign_id)
            .await?
            .filter(|c| c.is_active)
        else {
            // 活动在等待确认期间下线：丢弃状态即可
            return Ok(());
        };

        let wants_retake = message
            .trimmed_text()
            .is_some_and(|t| t.eq_ignore_ascii_case("yes") || t.eq_ignore_ascii_case("y"));

        if wants_retake {
            info!(campaign_id, user_id = user.id, "用户确认重做问卷");
            self.reset_questionnaire(user, &campaign).await?;
            self.claim_campaign(bot, user, &campaign, None).await
        } else {
            self.complete(bot, user, &campaign).await
        }
    }

    /// 记录问卷答案并推进到下一问
    async fn record_answer(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
        message: &IncomingMessage,
    ) -> Result<()> {
        let current = self.session.current_question(&user.chat_id).await?;
        let text = message.trimmed_text();

        if let (Some(question_id), Some(text)) = (current, text) {
            self.answers
                .create_answer(user.id, question_id, text)
                .await?;
            self.session.clear_current_question(&user.chat_id).await?;
            // 一条消息推进一问：重入一次状态机步骤找下一问或收尾
            return self.claim_campaign(bot, user, campaign, None).await;
        }

        if text.is_some() {
            // 问题游标已过期：重新提示当前问题（幂等回退）
            return self.claim_campaign(bot, user, campaign, None).await;
        }

        // 问卷不收图片等非文本消息
        Ok(())
    }

    /// 收取人工审核凭证，建立 pending 记录
    async fn record_proof(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
        message: &IncomingMessage,
    ) -> Result<()> {
        let proof = message
            .largest_photo_file_id()
            .or_else(|| message.trimmed_text());
        let Some(proof) = proof else {
            return Ok(());
        };

        self.attempts
            .create_attempt(user.id, campaign.id, AttemptStatus::Pending, Some(proof))
            .await?;
        self.session.clear_claim_intent(&user.chat_id).await?;

        info!(campaign_id = campaign.id, user_id = user.id, "凭证已收取，等待审核");

        let vars = TemplateVars::new().name(user.display_name());
        let text = self.renderer.render_or_default(
            campaign.success_message.as_deref(),
            PROOF_RECEIVED_DEFAULT,
            &vars,
        );
        self.outbox.send_to_user(bot, user, &text, None).await
    }

    // ==================== 收尾 ====================

    /// 问卷正常收尾：清答题标记，发成功文案，进入发放
    async fn finish_questionnaire(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<()> {
        self.session.clear_answering(&user.chat_id).await?;

        if let Some(template) = campaign.success_message.as_deref() {
            let vars = TemplateVars::new().name(user.display_name());
            let text = self.renderer.render(template, &vars);
            if let Err(e) = self.outbox.send_to_user(bot, user, &text, None).await {
                warn!(error = %e, "成功文案投递失败，继续发放");
            }
        }

        self.complete(bot, user, campaign).await
    }

    /// Completion：调用发放调度，按结果清理会话状态
    async fn complete(&self, bot: &BotProfile, user: &ChatUser, campaign: &Campaign) -> Result<()> {
        let outcome = self.fulfillment.fulfill(bot, user, campaign).await?;

        // AwaitingProof 刚刚重新设置了认领意向，不能清
        if outcome != FulfillmentOutcome::AwaitingProof {
            self.session.clear_all(&user.chat_id).await?;
        }

        Ok(())
    }

    // ==================== 辅助 ====================

    /// 为"散装"凭证自动探测目标：顺序扫描尚无 pending/approved 记录的活跃活动
    async fn find_target_campaign(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
    ) -> Result<Option<Campaign>> {
        for campaign in self.campaigns.list_active(bot.id).await? {
            if self
                .attempts
                .has_open_attempt(user.id, campaign.id)
                .await?
            {
                continue;
            }
            return Ok(Some(campaign));
        }
        Ok(None)
    }

    async fn questionnaire_fully_answered(
        &self,
        user_id: i64,
        campaign: &Campaign,
    ) -> Result<bool> {
        if campaign.requirement != RequirementKind::Questionnaire {
            return Ok(false);
        }
        let questions = self.campaigns.list_questions(campaign.id).await?;
        if questions.is_empty() {
            return Ok(false);
        }
        let answered: HashSet<i64> = self
            .answers
            .answered_question_ids(user_id, campaign.id)
            .await?
            .into_iter()
            .collect();
        Ok(questions.iter().all(|q| answered.contains(&q.id)))
    }

    /// 重做：删除旧答案和问题游标
    async fn reset_questionnaire(&self, user: &ChatUser, campaign: &Campaign) -> Result<()> {
        let deleted = self
            .answers
            .delete_answers_for_campaign(user.id, campaign.id)
            .await?;
        self.session.clear_current_question(&user.chat_id).await?;
        self.session.clear_answering(&user.chat_id).await?;
        info!(
            campaign_id = campaign.id,
            user_id = user.id,
            deleted,
            "旧答案已清除，流程重新开始"
        );
        Ok(())
    }

    async fn prompt_resume_choice(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
    ) -> Result<()> {
        self.session
            .set_resume_choice(&user.chat_id, campaign.id)
            .await?;
        self.outbox
            .send_to_user(bot, user, RESUME_CHOICE_PROMPT, None)
            .await
    }

    async fn send_prerequisite_failure(
        &self,
        bot: &BotProfile,
        user: &ChatUser,
        campaign: &Campaign,
        missing: &[i32],
    ) -> Result<()> {
        let text = match campaign.failure_message.as_deref() {
            Some(template) if !template.trim().is_empty() => {
                let vars = TemplateVars::new().name(user.display_name());
                self.renderer.render(template, &vars)
            }
            _ => format!("⚠️ Please start with {} first!", join_sequences(missing)),
        };

        self.outbox
            .send_to_user(bot, user, &text, Some(ReplyMarkup::remove_keyboard()))
            .await
    }
}
