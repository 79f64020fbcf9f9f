//! 业务服务层
//!
//! - `claim`: 领取流程状态机（中枢控制器）
//! - `prerequisite`: 前置条件解析
//! - `fulfillment`: 奖励发放调度
//! - `approval`: 人工审批事务
//! - `broadcast`: 群发
//! - `outbox`: 发送 + 审计日志出口

mod approval;
mod broadcast;
mod claim;
pub mod dto;
mod fulfillment;
mod outbox;
mod prerequisite;

pub use approval::ApprovalService;
pub use broadcast::BroadcastService;
pub use claim::{ClaimEngine, RETAKE_GRACE_SECS};
pub use fulfillment::{FulfillmentDispatcher, OUT_OF_STOCK_NOTICE, PROOF_PROMPT_DEFAULT};
pub use outbox::Outbox;
pub use prerequisite::{PrerequisiteResolver, join_sequences};
