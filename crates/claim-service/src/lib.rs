//! 活动领取服务
//!
//! 通过聊天机器人运营 giveaway 活动：用户与机器人对话、满足领取要求
//! （无要求 / 人工审核凭证 / 多题问卷 / 手机号验证），获得共享内容或
//! 库存中一件独占物品。管理员也可以人工批准待审记录，走同一条发放路径。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 数据库仓储层（含库存原子分配）
//! - `session`: TTL 会话状态存储
//! - `template`: 消息模板渲染
//! - `service`: 业务服务层（状态机、前置条件、发放、审批、群发）
//! - `telegram`: 协议边界（入站结构 + 出站发送）
//! - `worker`: 追发消息 Worker
//! - `handlers` / `routes` / `state`: HTTP 表面

pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;
pub mod telegram;
pub mod template;
pub mod worker;

pub use error::{ClaimError, Result};
pub use models::*;
pub use service::{
    ApprovalService, BroadcastService, ClaimEngine, FulfillmentDispatcher, Outbox,
    PrerequisiteResolver, RETAKE_GRACE_SECS,
};
pub use session::{RedisSessionStore, SessionStore};
pub use state::AppState;
pub use template::{TemplateRenderer, TemplateVars};
