//! 数据库仓储层
//!
//! 每个聚合一个仓储；服务层只依赖 traits 中的抽象

mod answer_repo;
mod attempt_repo;
mod bot_repo;
mod campaign_repo;
mod inventory_repo;
mod message_log_repo;
mod traits;
mod user_repo;

pub use answer_repo::AnswerRepository;
pub use attempt_repo::AttemptRepository;
pub use bot_repo::BotRepository;
pub use campaign_repo::CampaignRepository;
pub use inventory_repo::InventoryRepository;
pub use message_log_repo::MessageLogRepository;
pub use traits::{
    AnswerRepositoryTrait, AttemptRepositoryTrait, BotRepositoryTrait, CampaignRepositoryTrait,
    ChatUserRepositoryTrait, FollowUpDue, InventoryRepositoryTrait, MessageLogRepositoryTrait,
};
pub use user_repo::ChatUserRepository;

#[cfg(test)]
pub use traits::{
    MockAnswerRepositoryTrait, MockAttemptRepositoryTrait, MockBotRepositoryTrait,
    MockCampaignRepositoryTrait, MockChatUserRepositoryTrait, MockInventoryRepositoryTrait,
    MockMessageLogRepositoryTrait,
};
