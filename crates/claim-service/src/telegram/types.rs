//! Telegram 入站消息结构
//!
//! webhook 收到的 Update 载荷，只声明本服务关心的字段，
//! 其余字段由 serde 忽略。

use serde::{Deserialize, Serialize};
use serde_json::json;

/// 一次 webhook 投递
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

/// 入站消息
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub from: Option<MessageSenderInfo>,
    pub text: Option<String>,
    /// 同一张图的多个尺寸，最后一个最大
    pub photo: Option<Vec<PhotoSize>>,
    pub contact: Option<Contact>,
}

impl IncomingMessage {
    /// 图片凭证：取最大尺寸的 file_id
    pub fn largest_photo_file_id(&self) -> Option<&str> {
        self.photo
            .as_ref()
            .and_then(|sizes| sizes.last())
            .map(|p| p.file_id.as_str())
    }

    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// 消息发送者资料
#[derive(Debug, Clone, Deserialize)]
pub struct MessageSenderInfo {
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

/// 联系人分享（手机号验证）
#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub phone_number: String,
}

/// 出站消息的键盘标记
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReplyMarkup(serde_json::Value);

impl ReplyMarkup {
    /// 收起自定义键盘
    pub fn remove_keyboard() -> Self {
        Self(json!({ "remove_keyboard": true }))
    }

    /// 请求分享手机号的一次性键盘
    pub fn contact_request() -> Self {
        Self(json!({
            "keyboard": [[{
                "text": "📱 Share Phone Number",
                "request_contact": true
            }]],
            "one_time_keyboard": true,
            "resize_keyboard": true
        }))
    }
}
