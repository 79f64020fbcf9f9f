//! 服务层请求/响应结构

use serde::{Deserialize, Serialize};
use validator::Validate;

/// 奖励发放结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    /// 奖励已发出（或投递失败但已记账，见日志）
    Delivered,
    /// 库存耗尽，未建立领取记录
    OutOfStock,
    /// 需要先提交凭证，已重新提示
    AwaitingProof,
}

/// 人工审批请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ApproveAttemptRequest {
    /// 审批备注，写入 admin_notes
    #[validate(length(max = 1000, message = "备注过长"))]
    pub notes: Option<String>,
}

/// 人工审批响应
///
/// 状态变更总是被持久化；warning 向操作员暴露"已批准但没发出去"的情况
/// （库存耗尽或投递失败），绝不静默吞掉。
#[derive(Debug, Clone, Serialize)]
pub struct ApproveAttemptResponse {
    pub attempt_id: i64,
    pub approved: bool,
    /// 奖励内容是否成功送达用户
    pub reward_delivered: bool,
    /// 操作员可见的警告（如 "NO ITEMS LEFT"）
    pub warning: Option<String>,
}

/// 群发请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BroadcastRequest {
    pub bot_id: i64,
    #[validate(length(min = 1, max = 4096, message = "消息长度须在 1..=4096"))]
    pub text: String,
}

/// 群发响应
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastResponse {
    /// 目标用户数
    pub total: u64,
    /// 成功送达数
    pub sent: u64,
}
