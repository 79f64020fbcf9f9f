//! 流程测试的内存后端
//!
//! 用 DashMap / parking_lot 实现全部仓储 trait、会话存储和一个记录型
//! 发送器，让状态机在没有 Postgres/Redis 的情况下完整跑通。
//! 内存分配器在互斥锁内完成挑选和占用，与生产实现的条件更新同样可线性化。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use claim_service::error::{ClaimError, Result};
use claim_service::models::{
    Answer, Attempt, AttemptStatus, BotProfile, Campaign, CampaignKind, ChatUser, InventoryItem,
    MessageDirection, NewsPost, Question, RequirementKind,
};
use claim_service::repository::{
    AnswerRepositoryTrait, AttemptRepositoryTrait, BotRepositoryTrait, CampaignRepositoryTrait,
    ChatUserRepositoryTrait, FollowUpDue, InventoryRepositoryTrait, MessageLogRepositoryTrait,
};
use claim_service::service::{
    ApprovalService, BroadcastService, ClaimEngine, FulfillmentDispatcher, Outbox,
};
use claim_service::session::SessionStore;
use claim_service::telegram::{MessageSender, ReplyMarkup};
use claim_service::worker::FollowUpWorker;

/// 内存后端：同时实现全部仓储 trait 和会话存储
#[derive(Default)]
pub struct TestBackend {
    next_id: AtomicI64,
    pub bots: Mutex<Vec<BotProfile>>,
    pub users: Mutex<Vec<ChatUser>>,
    pub campaigns: Mutex<Vec<Campaign>>,
    pub questions: Mutex<Vec<Question>>,
    pub items: Mutex<Vec<InventoryItem>>,
    pub attempts: Mutex<Vec<Attempt>>,
    pub answers: Mutex<Vec<Answer>>,
    pub news: Mutex<Vec<NewsPost>>,
    pub logs: Mutex<Vec<(i64, i64, MessageDirection, String)>>,

    claim_intent: DashMap<String, i64>,
    current_question: DashMap<String, i64>,
    answering: DashMap<String, bool>,
    resume_choice: DashMap<String, i64>,
}

impl TestBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ==================== 种子数据 ====================

    pub fn seed_bot(&self) -> BotProfile {
        let bot = BotProfile {
            id: self.next_id(),
            name: "Test Bot".to_string(),
            username: "@test_bot".to_string(),
            token: "test-token".to_string(),
            start_message_header: "Available giveaways:".to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.bots.lock().push(bot.clone());
        bot
    }

    pub fn seed_user(&self, bot: &BotProfile, chat_id: &str, first_name: &str) -> ChatUser {
        let user = ChatUser {
            id: self.next_id(),
            bot_id: bot.id,
            chat_id: chat_id.to_string(),
            username: None,
            first_name: Some(first_name.to_string()),
            phone_number: None,
            joined_at: Utc::now(),
        };
        self.users.lock().push(user.clone());
        user
    }

    pub fn seed_campaign(
        &self,
        bot: &BotProfile,
        sequence: i32,
        kind: CampaignKind,
        requirement: RequirementKind,
    ) -> Campaign {
        let campaign = Campaign {
            id: self.next_id(),
            bot_id: bot.id,
            title: format!("Campaign {}", sequence),
            description: String::new(),
            kind,
            requirement,
            sequence: Some(sequence),
            prerequisite_threshold: None,
            allow_retake: false,
            static_content: Some(format!("https://example.com/reward-{}", sequence)),
            approval_message: None,
            failure_message: None,
            prompt_message: None,
            success_message: None,
            follow_up_text: None,
            follow_up_delay_secs: None,
            is_active: true,
            created_at: Utc::now(),
        };
        self.campaigns.lock().push(campaign.clone());
        campaign
    }

    /// 就地修改已种下的活动（阈值、允许重做等）
    pub fn update_campaign(&self, id: i64, f: impl FnOnce(&mut Campaign)) -> Campaign {
        let mut campaigns = self.campaigns.lock();
        let campaign = campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .expect("campaign not seeded");
        f(campaign);
        campaign.clone()
    }

    pub fn seed_item(&self, campaign: &Campaign, content: &str) -> InventoryItem {
        let item = InventoryItem {
            id: self.next_id(),
            campaign_id: campaign.id,
            content: content.to_string(),
            used: false,
            claimed_by: None,
            claimed_at: None,
        };
        self.items.lock().push(item.clone());
        item
    }

    pub fn seed_question(&self, campaign: &Campaign, position: i32, text: &str) -> Question {
        let question = Question {
            id: self.next_id(),
            campaign_id: campaign.id,
            text: text.to_string(),
            position,
        };
        self.questions.lock().push(question.clone());
        question
    }

    // ==================== 时间操控 ====================

    /// 把用户在某活动下的全部答案回拨到 age_secs 秒前
    pub fn backdate_answers(&self, user_id: i64, campaign_id: i64, age_secs: i64) {
        let question_ids: Vec<i64> = self
            .questions
            .lock()
            .iter()
            .filter(|q| q.campaign_id == campaign_id)
            .map(|q| q.id)
            .collect();
        let ts = Utc::now() - chrono::Duration::seconds(age_secs);
        for answer in self.answers.lock().iter_mut() {
            if answer.user_id == user_id && question_ids.contains(&answer.question_id) {
                answer.answered_at = ts;
            }
        }
    }

    /// 把领取记录回拨到 age_secs 秒前（追发延迟测试用）
    pub fn backdate_attempt(&self, attempt_id: i64, age_secs: i64) {
        let ts = Utc::now() - chrono::Duration::seconds(age_secs);
        for attempt in self.attempts.lock().iter_mut() {
            if attempt.id == attempt_id {
                attempt.created_at = ts;
            }
        }
    }

    // ==================== 断言辅助 ====================

    pub fn attempts_for(&self, user_id: i64, campaign_id: i64) -> Vec<Attempt> {
        self.attempts
            .lock()
            .iter()
            .filter(|a| a.user_id == user_id && a.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub fn item_by_id(&self, id: i64) -> InventoryItem {
        self.items
            .lock()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .expect("item not found")
    }

    pub fn answers_for(&self, user_id: i64, campaign_id: i64) -> Vec<Answer> {
        let question_ids: Vec<i64> = self
            .questions
            .lock()
            .iter()
            .filter(|q| q.campaign_id == campaign_id)
            .map(|q| q.id)
            .collect();
        self.answers
            .lock()
            .iter()
            .filter(|a| a.user_id == user_id && question_ids.contains(&a.question_id))
            .cloned()
            .collect()
    }
}

// ==================== 仓储实现 ====================

#[async_trait]
impl BotRepositoryTrait for TestBackend {
    async fn get_bot(&self, id: i64) -> Result<Option<BotProfile>> {
        Ok(self.bots.lock().iter().find(|b| b.id == id).cloned())
    }

    async fn get_active_by_token(&self, token: &str) -> Result<Option<BotProfile>> {
        Ok(self
            .bots
            .lock()
            .iter()
            .find(|b| b.token == token && b.is_active)
            .cloned())
    }

    async fn latest_news(&self, bot_id: i64) -> Result<Option<NewsPost>> {
        let news = self.news.lock();
        Ok(news
            .iter()
            .filter(|n| n.bot_id == bot_id)
            .max_by_key(|n| n.sent_at)
            .cloned())
    }
}

#[async_trait]
impl ChatUserRepositoryTrait for TestBackend {
    async fn get_user(&self, id: i64) -> Result<Option<ChatUser>> {
        Ok(self.users.lock().iter().find(|u| u.id == id).cloned())
    }

    async fn upsert_user<'a>(
        &self,
        bot_id: i64,
        chat_id: &str,
        username: Option<&'a str>,
        first_name: Option<&'a str>,
    ) -> Result<ChatUser> {
        let mut users = self.users.lock();
        if let Some(user) = users
            .iter_mut()
            .find(|u| u.bot_id == bot_id && u.chat_id == chat_id)
        {
            user.username = username.map(str::to_string);
            user.first_name = first_name.map(str::to_string);
            return Ok(user.clone());
        }
        let user = ChatUser {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            bot_id,
            chat_id: chat_id.to_string(),
            username: username.map(str::to_string),
            first_name: first_name.map(str::to_string),
            phone_number: None,
            joined_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn set_phone_number(&self, user_id: i64, phone_number: &str) -> Result<()> {
        for user in self.users.lock().iter_mut() {
            if user.id == user_id {
                user.phone_number = Some(phone_number.to_string());
            }
        }
        Ok(())
    }

    async fn list_users_by_bot(&self, bot_id: i64) -> Result<Vec<ChatUser>> {
        Ok(self
            .users
            .lock()
            .iter()
            .filter(|u| u.bot_id == bot_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CampaignRepositoryTrait for TestBackend {
    async fn get_campaign(&self, id: i64) -> Result<Option<Campaign>> {
        Ok(self.campaigns.lock().iter().find(|c| c.id == id).cloned())
    }

    async fn get_active_by_sequence(&self, bot_id: i64, sequence: i32) -> Result<Option<Campaign>> {
        Ok(self
            .campaigns
            .lock()
            .iter()
            .find(|c| c.bot_id == bot_id && c.sequence == Some(sequence) && c.is_active)
            .cloned())
    }

    async fn list_active(&self, bot_id: i64) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .lock()
            .iter()
            .filter(|c| c.bot_id == bot_id && c.is_active)
            .cloned()
            .collect();
        campaigns.sort_by_key(|c| (c.sequence.is_none(), c.sequence, c.id));
        Ok(campaigns)
    }

    async fn list_questions(&self, campaign_id: i64) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions
            .lock()
            .iter()
            .filter(|q| q.campaign_id == campaign_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.position, q.id));
        Ok(questions)
    }
}

#[async_trait]
impl InventoryRepositoryTrait for TestBackend {
    async fn allocate(&self, campaign_id: i64, user_id: i64) -> Result<Option<InventoryItem>> {
        // 挑选和占用在同一把锁内完成，等价于生产实现的条件更新
        let mut items = self.items.lock();
        let item = items
            .iter_mut()
            .filter(|i| i.campaign_id == campaign_id && !i.used)
            .min_by_key(|i| i.id);
        Ok(item.map(|item| {
            item.used = true;
            item.claimed_by = Some(user_id);
            item.claimed_at = Some(Utc::now());
            item.clone()
        }))
    }

    async fn count_available(&self, campaign_id: i64) -> Result<i64> {
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|i| i.campaign_id == campaign_id && !i.used)
            .count() as i64)
    }
}

#[async_trait]
impl AttemptRepositoryTrait for TestBackend {
    async fn get_attempt(&self, id: i64) -> Result<Option<Attempt>> {
        Ok(self.attempts.lock().iter().find(|a| a.id == id).cloned())
    }

    async fn create_attempt<'a>(
        &self,
        user_id: i64,
        campaign_id: i64,
        status: AttemptStatus,
        proof: Option<&'a str>,
    ) -> Result<Attempt> {
        let attempt = Attempt {
            id: self.next_id(),
            user_id,
            campaign_id,
            status,
            proof: proof.map(str::to_string),
            admin_notes: None,
            follow_up_sent: false,
            created_at: Utc::now(),
        };
        self.attempts.lock().push(attempt.clone());
        Ok(attempt)
    }

    async fn has_open_attempt(&self, user_id: i64, campaign_id: i64) -> Result<bool> {
        Ok(self
            .attempts
            .lock()
            .iter()
            .any(|a| a.user_id == user_id && a.campaign_id == campaign_id && a.is_open()))
    }

    async fn has_approved_attempt(&self, user_id: i64, campaign_id: i64) -> Result<bool> {
        Ok(self.attempts.lock().iter().any(|a| {
            a.user_id == user_id
                && a.campaign_id == campaign_id
                && a.status == AttemptStatus::Approved
        }))
    }

    async fn set_status<'a>(
        &self,
        id: i64,
        status: AttemptStatus,
        admin_notes: Option<&'a str>,
    ) -> Result<()> {
        for attempt in self.attempts.lock().iter_mut() {
            if attempt.id == id {
                attempt.status = status;
                if admin_notes.is_some() {
                    attempt.admin_notes = admin_notes.map(str::to_string);
                }
            }
        }
        Ok(())
    }

    async fn list_due_follow_ups(&self, now: DateTime<Utc>) -> Result<Vec<FollowUpDue>> {
        let campaigns: HashMap<i64, Campaign> = self
            .campaigns
            .lock()
            .iter()
            .map(|c| (c.id, c.clone()))
            .collect();
        let users: HashMap<i64, ChatUser> =
            self.users.lock().iter().map(|u| (u.id, u.clone())).collect();
        let bots: HashMap<i64, BotProfile> =
            self.bots.lock().iter().map(|b| (b.id, b.clone())).collect();

        let due = self
            .attempts
            .lock()
            .iter()
            .filter(|a| a.status == AttemptStatus::Approved && !a.follow_up_sent)
            .filter_map(|a| {
                let campaign = campaigns.get(&a.campaign_id)?;
                if !campaign.has_follow_up() {
                    return None;
                }
                let delay = campaign.follow_up_delay_secs?;
                if a.created_at + chrono::Duration::seconds(delay) > now {
                    return None;
                }
                let user = users.get(&a.user_id)?;
                let bot = bots.get(&campaign.bot_id)?;
                Some(FollowUpDue {
                    attempt_id: a.id,
                    bot_id: bot.id,
                    bot_token: bot.token.clone(),
                    user_id: user.id,
                    chat_id: user.chat_id.clone(),
                    follow_up_text: campaign.follow_up_text.clone().unwrap_or_default(),
                })
            })
            .collect();
        Ok(due)
    }

    async fn mark_follow_up_sent(&self, attempt_id: i64) -> Result<bool> {
        for attempt in self.attempts.lock().iter_mut() {
            if attempt.id == attempt_id {
                if attempt.follow_up_sent {
                    return Ok(false);
                }
                attempt.follow_up_sent = true;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl AnswerRepositoryTrait for TestBackend {
    async fn answered_question_ids(&self, user_id: i64, campaign_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .answers_for(user_id, campaign_id)
            .into_iter()
            .map(|a| a.question_id)
            .collect())
    }

    async fn latest_answer_at(
        &self,
        user_id: i64,
        campaign_id: i64,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .answers_for(user_id, campaign_id)
            .into_iter()
            .map(|a| a.answered_at)
            .max())
    }

    async fn create_answer(&self, user_id: i64, question_id: i64, text: &str) -> Result<Answer> {
        let answer = Answer {
            id: self.next_id(),
            user_id,
            question_id,
            text: text.to_string(),
            answered_at: Utc::now(),
        };
        self.answers.lock().push(answer.clone());
        Ok(answer)
    }

    async fn delete_answers_for_campaign(&self, user_id: i64, campaign_id: i64) -> Result<u64> {
        let question_ids: Vec<i64> = self
            .questions
            .lock()
            .iter()
            .filter(|q| q.campaign_id == campaign_id)
            .map(|q| q.id)
            .collect();
        let mut answers = self.answers.lock();
        let before = answers.len();
        answers.retain(|a| !(a.user_id == user_id && question_ids.contains(&a.question_id)));
        Ok((before - answers.len()) as u64)
    }
}

#[async_trait]
impl MessageLogRepositoryTrait for TestBackend {
    async fn append_log(
        &self,
        bot_id: i64,
        user_id: i64,
        direction: MessageDirection,
        content: &str,
    ) -> Result<()> {
        self.logs
            .lock()
            .push((bot_id, user_id, direction, content.to_string()));
        Ok(())
    }
}

// ==================== 会话存储实现 ====================

#[async_trait]
impl SessionStore for TestBackend {
    async fn set_claim_intent(
        &self,
        chat_id: &str,
        campaign_id: i64,
        _ttl: Duration,
    ) -> Result<()> {
        self.claim_intent.insert(chat_id.to_string(), campaign_id);
        Ok(())
    }

    async fn claim_intent(&self, chat_id: &str) -> Result<Option<i64>> {
        Ok(self.claim_intent.get(chat_id).map(|v| *v))
    }

    async fn clear_claim_intent(&self, chat_id: &str) -> Result<()> {
        self.claim_intent.remove(chat_id);
        Ok(())
    }

    async fn set_current_question(&self, chat_id: &str, question_id: i64) -> Result<()> {
        self.current_question
            .insert(chat_id.to_string(), question_id);
        Ok(())
    }

    async fn current_question(&self, chat_id: &str) -> Result<Option<i64>> {
        Ok(self.current_question.get(chat_id).map(|v| *v))
    }

    async fn clear_current_question(&self, chat_id: &str) -> Result<()> {
        self.current_question.remove(chat_id);
        Ok(())
    }

    async fn set_answering(&self, chat_id: &str) -> Result<()> {
        self.answering.insert(chat_id.to_string(), true);
        Ok(())
    }

    async fn is_answering(&self, chat_id: &str) -> Result<bool> {
        Ok(self.answering.get(chat_id).map(|v| *v).unwrap_or(false))
    }

    async fn clear_answering(&self, chat_id: &str) -> Result<()> {
        self.answering.remove(chat_id);
        Ok(())
    }

    async fn set_resume_choice(&self, chat_id: &str, campaign_id: i64) -> Result<()> {
        self.resume_choice.insert(chat_id.to_string(), campaign_id);
        Ok(())
    }

    async fn resume_choice(&self, chat_id: &str) -> Result<Option<i64>> {
        Ok(self.resume_choice.get(chat_id).map(|v| *v))
    }

    async fn clear_resume_choice(&self, chat_id: &str) -> Result<()> {
        self.resume_choice.remove(chat_id);
        Ok(())
    }

    async fn clear_all(&self, chat_id: &str) -> Result<()> {
        self.claim_intent.remove(chat_id);
        self.current_question.remove(chat_id);
        self.answering.remove(chat_id);
        self.resume_choice.remove(chat_id);
        Ok(())
    }
}

// ==================== 记录型发送器 ====================

/// 记录所有出站消息；可切换为失败模式模拟投递故障
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn messages_to(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(chat, _)| chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_message_to(&self, chat_id: &str) -> Option<String> {
        self.messages_to(chat_id).pop()
    }

    pub fn total_sent(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        _bot_token: &str,
        chat_id: &str,
        text: &str,
        _reply_markup: Option<ReplyMarkup>,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClaimError::Delivery("simulated delivery failure".into()));
        }
        self.sent
            .lock()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

// ==================== 组装 ====================

/// 全套测试装置
pub struct Harness {
    pub backend: Arc<TestBackend>,
    pub sender: Arc<RecordingSender>,
    pub engine: ClaimEngine,
    pub approval: ApprovalService,
    pub broadcast: BroadcastService,
    pub worker: FollowUpWorker,
}

impl Harness {
    pub fn new() -> Self {
        let backend = TestBackend::new();
        let sender = RecordingSender::new();

        let outbox = Arc::new(Outbox::new(sender.clone(), backend.clone()));
        let fulfillment = Arc::new(FulfillmentDispatcher::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            outbox.clone(),
        ));
        let engine = ClaimEngine::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            outbox.clone(),
            fulfillment,
        );
        let approval = ApprovalService::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            outbox.clone(),
        );
        let broadcast = BroadcastService::new(backend.clone(), backend.clone(), outbox.clone());
        let worker = FollowUpWorker::new(backend.clone(), outbox, Duration::from_secs(60));

        Self {
            backend,
            sender,
            engine,
            approval,
            broadcast,
            worker,
        }
    }
}

/// 构造一条纯文本入站消息
pub fn text_message(chat_id: i64, text: &str) -> claim_service::telegram::IncomingMessage {
    serde_json::from_value(serde_json::json!({
        "chat": {"id": chat_id},
        "text": text
    }))
    .expect("valid message json")
}

/// 构造一条图片入站消息
pub fn photo_message(chat_id: i64, file_id: &str) -> claim_service::telegram::IncomingMessage {
    serde_json::from_value(serde_json::json!({
        "chat": {"id": chat_id},
        "photo": [{"file_id": file_id}]
    }))
    .expect("valid message json")
}
