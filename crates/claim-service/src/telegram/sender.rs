//! 出站消息发送
//!
//! 通过 `MessageSender` trait 抽象发送行为，生产实现调用 Telegram Bot API。
//! 发送是尽力而为：失败会被记录并作为投递错误返回，核心内不重试
//! （重试属于外围调度的职责）。

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error};

use giveaway_shared::config::TelegramConfig;

use super::types::ReplyMarkup;
use crate::error::{ClaimError, Result};

/// 出站消息发送器
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// 向指定 chat 发送一条文本消息
    async fn send(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<()>;
}

/// Telegram Bot API 发送器
pub struct TelegramSender {
    http: reqwest::Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_seconds))
            .build()
            .map_err(|e| ClaimError::Internal(format!("HTTP client build error: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(
        &self,
        bot_token: &str,
        chat_id: &str,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, bot_token);

        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| ClaimError::Internal(format!("reply markup encode error: {}", e)))?;
        }

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                metrics::counter!("delivery_failures_total").increment(1);
                error!(chat_id, error = %e, "Failed to send Telegram message");
                ClaimError::Delivery(e.to_string())
            })?;

        if !response.status().is_success() {
            metrics::counter!("delivery_failures_total").increment(1);
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(chat_id, %status, body, "Telegram API returned error");
            return Err(ClaimError::Delivery(format!(
                "sendMessage returned {}",
                status
            )));
        }

        debug!(chat_id, "Telegram message sent");
        Ok(())
    }
}
