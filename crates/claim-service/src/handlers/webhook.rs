//! Telegram webhook 入口
//!
//! 解码 Update，落实聊天用户，记录入站日志，按消息形态分派给状态机。
//! 业务处理失败只记日志仍回 200，避免 Telegram 对同一 update 反复重投。

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, instrument, warn};

use crate::error::{ClaimError, Result};
use crate::models::MessageDirection;
use crate::state::AppState;
use crate::telegram::Update;

/// POST /webhook/{token}
#[instrument(skip(state, update), fields(update_id = update.update_id))]
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(update): Json<Update>,
) -> Result<StatusCode> {
    // token 识别机器人；未知或停用的一律 404，不泄露内部细节
    let bot = state
        .bots
        .get_active_by_token(&token)
        .await?
        .ok_or(ClaimError::BotNotFound)?;

    let Some(message) = update.message else {
        return Ok(StatusCode::OK);
    };

    let chat_id = message.chat.id.to_string();
    let (username, first_name) = message
        .from
        .as_ref()
        .map(|f| (f.username.as_deref(), f.first_name.as_deref()))
        .unwrap_or((None, None));

    let user = state
        .users
        .upsert_user(bot.id, &chat_id, username, first_name)
        .await?;

    // 联系人分享单独处理并立即返回，避免同一消息被二次解释
    if let Some(contact) = &message.contact {
        if let Err(e) = state
            .engine
            .handle_contact(&bot, &user, &contact.phone_number)
            .await
        {
            error!(update_id = update.update_id, error = %e, "联系人处理失败");
        }
        return Ok(StatusCode::OK);
    }

    // 入站审计日志（旁路，失败不中断）
    if let Some(text) = message.trimmed_text() {
        if let Err(e) = state
            .message_log
            .append_log(bot.id, user.id, MessageDirection::Inbound, text)
            .await
        {
            warn!(user_id = user.id, error = %e, "入站消息审计日志写入失败");
        }
    }

    let result = match message.trimmed_text() {
        Some("/start") => state.engine.handle_start(&bot, &user).await,
        Some(text) if is_claim_command(text) => {
            state.engine.handle_claim_command(&bot, &user, text).await
        }
        Some(text) if !text.starts_with('/') => {
            state.engine.handle_inbound(&bot, &user, &message).await
        }
        None if message.photo.is_some() => state.engine.handle_inbound(&bot, &user, &message).await,
        // 未知指令或空消息：忽略
        _ => Ok(()),
    };

    if let Err(e) = result {
        error!(update_id = update.update_id, error = %e, "update 处理失败");
    }

    Ok(StatusCode::OK)
}

/// `/claim_123`、`123`、`123 proof...` 都算领取指令
fn is_claim_command(text: &str) -> bool {
    if text.starts_with("/claim_") {
        return true;
    }
    text.split_whitespace()
        .next()
        .is_some_and(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
