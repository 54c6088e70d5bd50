//! 风控决策模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 风控配置键
pub mod config_keys {
    pub const MAX_DAILY_WITHDRAWAL: &str = "max_daily_withdrawal";
    pub const KYC_WITHDRAWAL_LIMIT: &str = "kyc_withdrawal_limit";
    pub const SUSPICIOUS_PATTERN_THRESHOLD: &str = "suspicious_pattern_threshold";
    pub const MAX_DAILY_DEPOSIT: &str = "max_daily_deposit";
}

/// 触发的风控规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRule {
    BlacklistedAddress,
    DailyLimitExceeded,
    DailyLimitApproaching,
    KycRequired,
    FrequentWithdrawals,
    UnusualAmount,
    WeeklyVelocityExceeded,
    ManualReviewRequired,
    DailyDepositLimitExceeded,
}

/// 单条风控原因（机器可读规则 + 说明）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskReason {
    pub rule: RiskRule,
    pub message: String,
}

impl RiskReason {
    pub fn new(rule: RiskRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

/// 风控决策
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskDecision {
    /// 综合风险分，0-100
    pub score: u8,
    pub reasons: Vec<RiskReason>,
    pub requires_kyc: bool,
    /// 超出日限额时剩余可提额度
    pub max_allowed_amount: Option<Decimal>,
    pub approved: bool,
    pub hold_hours: u32,
    pub requires_manual_review: bool,
}

impl RiskDecision {
    pub fn has_rule(&self, rule: RiskRule) -> bool {
        self.reasons.iter().any(|r| r.rule == rule)
    }
}

/// 分数区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// < 30：立即可结算
    Clear,
    /// 30-49：通过，延迟 1 小时
    Delayed,
    /// 50-79：不自动通过，挂起 24 小时等待人工审核
    Review,
    /// >= 80：拒绝
    Reject,
}

impl ScoreBand {
    pub fn classify(score: u8) -> Self {
        match score {
            80.. => ScoreBand::Reject,
            50..=79 => ScoreBand::Review,
            30..=49 => ScoreBand::Delayed,
            _ => ScoreBand::Clear,
        }
    }

    /// (approved, hold_hours, requires_manual_review)
    pub fn outcome(&self) -> (bool, u32, bool) {
        match self {
            ScoreBand::Clear => (true, 0, false),
            ScoreBand::Delayed => (true, 1, false),
            ScoreBand::Review => (false, 24, true),
            ScoreBand::Reject => (false, 0, false),
        }
    }
}

/// 黑名单地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistAddress {
    pub address: String,
    /// 为空表示全链生效
    pub chain_id: Option<i64>,
    pub reason: Option<String>,
    pub source: Option<String>,
    pub is_active: bool,
}
