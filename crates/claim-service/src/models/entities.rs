//! 领域模型定义
//!
//! 所有实体与数据库表一一对应，通过 sqlx::FromRow 读取。
//! Campaign 和 InventoryItem 由管理员创建、长期存在；
//! Attempt 和 Answer 由状态机在用户交互中追加写入，除状态/标记外不再修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AttemptStatus, CampaignKind, MessageDirection, RequirementKind};

/// 机器人档案
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BotProfile {
    pub id: i64,
    pub name: String,
    /// 例如 @socialappfarm_bot
    pub username: String,
    pub token: String,
    /// /start 回复中活动列表之前的导语
    pub start_message_header: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 聊天用户
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatUser {
    pub id: i64,
    pub bot_id: i64,
    pub chat_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub phone_number: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl ChatUser {
    /// 用于消息模板 {name} 变量的显示名
    pub fn display_name(&self) -> &str {
        self.first_name.as_deref().unwrap_or("Friend")
    }
}

/// 活动（giveaway）
///
/// 四个 `*_message` 字段是可选的消息模板，识别 `{content}` 和 `{name}`
/// 两个替换变量；为空时各调用点使用硬编码的默认文案。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub bot_id: i64,
    pub title: String,
    pub description: String,
    pub kind: CampaignKind,
    pub requirement: RequirementKind,
    /// 同一机器人下非空时唯一，决定展示编号和顺序
    pub sequence: Option<i32>,
    /// 非空时，所有 sequence <= 该值的同机器人活跃活动必须先完成
    pub prerequisite_threshold: Option<i32>,
    pub allow_retake: bool,
    /// 标准活动的共享内容（如 PDF 链接）
    pub static_content: Option<String>,
    pub approval_message: Option<String>,
    pub failure_message: Option<String>,
    pub prompt_message: Option<String>,
    pub success_message: Option<String>,
    pub follow_up_text: Option<String>,
    pub follow_up_delay_secs: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// /start 列表中的一行
    pub fn display_line(&self) -> Option<String> {
        self.sequence
            .map(|seq| format!("{} - Reply {}", self.title, seq))
    }

    /// 是否配置了追发消息
    pub fn has_follow_up(&self) -> bool {
        self.follow_up_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
            && self.follow_up_delay_secs.is_some()
    }
}

/// 库存物品（唯一活动的独占内容）
///
/// 不变式：(used, claimed_by) 只会从 (false, None) 单调迁移到
/// (true, Some(user))，一经设置不再回退。
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: i64,
    pub campaign_id: i64,
    /// 秘密载荷，如 "User: admin, Pass: 1234"
    pub content: String,
    pub used: bool,
    pub claimed_by: Option<i64>,
    pub claimed_at: Option<DateTime<Utc>>,
}

/// 领取记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub campaign_id: i64,
    pub status: AttemptStatus,
    /// 人工审核的凭证：文字或图片 file_id
    pub proof: Option<String>,
    pub admin_notes: Option<String>,
    pub follow_up_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    /// pending 或 approved 都视为"占用中"，阻止重复领取
    pub fn is_open(&self) -> bool {
        matches!(self.status, AttemptStatus::Pending | AttemptStatus::Approved)
    }
}

/// 问卷问题（按 position 排序）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub campaign_id: i64,
    pub text: String,
    pub position: i32,
}

/// 用户答案
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Answer {
    pub id: i64,
    pub user_id: i64,
    pub question_id: i64,
    pub text: String,
    pub answered_at: DateTime<Utc>,
}

/// 新闻公告（/start 展示最新一条）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsPost {
    pub id: i64,
    pub bot_id: i64,
    pub title: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// 消息审计日志（只追加，不参与正确性）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageLog {
    pub id: i64,
    pub bot_id: i64,
    pub user_id: i64,
    pub direction: MessageDirection,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
