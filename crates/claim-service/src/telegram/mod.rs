//! Telegram 协议边界
//!
//! 入站结构解码和出站发送。核心不解析传输帧，webhook handler
//! 解出 Update 后交给状态机。

mod sender;
mod types;

pub use sender::{MessageSender, TelegramSender};
pub use types::{Chat, Contact, IncomingMessage, MessageSenderInfo, PhotoSize, ReplyMarkup, Update};

#[cfg(test)]
pub use sender::MockMessageSender;
