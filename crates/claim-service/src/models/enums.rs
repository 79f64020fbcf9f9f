//! 活动服务枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化。
//! 活动类型与领取要求是两个封闭的维度，状态机对其笛卡尔积做完全匹配，
//! 新增变体会在编译期暴露所有未处理的分支。

use serde::{Deserialize, Serialize};

/// 活动类型
///
/// 决定奖励的发放方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum CampaignKind {
    /// 标准活动 - 所有人领到同一份共享内容
    #[default]
    Standard,
    /// 唯一活动 - 每人领取库存中一件独占物品
    Unique,
}

/// 领取要求
///
/// 用户在获得奖励前必须通过的门槛
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum RequirementKind {
    /// 无要求 - 直接发放
    #[default]
    None,
    /// 人工审核 - 用户提交凭证（截图/文字），管理员审批
    ManualApproval,
    /// 问卷 - 按顺序回答活动下的全部问题
    Questionnaire,
    /// 手机号 - 通过联系人分享验证手机号
    PhoneNumber,
}

impl RequirementKind {
    /// 数据库/用户提示中使用的标签
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ManualApproval => "manual_approval",
            Self::Questionnaire => "questionnaire",
            Self::PhoneNumber => "phone_number",
        }
    }
}

/// 领取记录状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum AttemptStatus {
    /// 待审核 - 等待管理员处理
    Pending,
    /// 已通过 - 奖励已发放（或人工批准）
    #[default]
    Approved,
    /// 已拒绝
    Rejected,
}

/// 消息方向
///
/// 审计日志用，区分收到的和发出的消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}
