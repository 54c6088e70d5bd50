//! 提现申请状态机
//!
//! ```text
//! Pending       -> Processing | Rejected
//! PendingReview -> Pending    | Rejected
//! Processing    -> Completed  | Failed
//! ```
//! Completed / Failed / Rejected 为终态。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 提现状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawStatus {
    Pending,
    PendingReview,
    Processing,
    Completed,
    Failed,
    Rejected,
}

impl WithdrawStatus {
    /// 计入时间窗口额度的状态（已占用或已结算）
    pub const COMMITTED: [WithdrawStatus; 4] = [
        WithdrawStatus::Pending,
        WithdrawStatus::PendingReview,
        WithdrawStatus::Processing,
        WithdrawStatus::Completed,
    ];

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WithdrawStatus::Pending),
            "pending_review" => Ok(WithdrawStatus::PendingReview),
            "processing" => Ok(WithdrawStatus::Processing),
            "completed" => Ok(WithdrawStatus::Completed),
            "failed" => Ok(WithdrawStatus::Failed),
            "rejected" => Ok(WithdrawStatus::Rejected),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown withdraw status: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawStatus::Pending => "pending",
            WithdrawStatus::PendingReview => "pending_review",
            WithdrawStatus::Processing => "processing",
            WithdrawStatus::Completed => "completed",
            WithdrawStatus::Failed => "failed",
            WithdrawStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawStatus::Completed | WithdrawStatus::Failed | WithdrawStatus::Rejected
        )
    }

    pub fn is_committed(&self) -> bool {
        Self::COMMITTED.contains(self)
    }

    /// 验证状态转换是否合法，相同状态视为幂等
    pub fn validate_transition(from: WithdrawStatus, to: WithdrawStatus) -> Result<(), CoreError> {
        if from == to {
            return Ok(());
        }

        let valid = match from {
            WithdrawStatus::Pending => {
                matches!(to, WithdrawStatus::Processing | WithdrawStatus::Rejected)
            }
            WithdrawStatus::PendingReview => {
                matches!(to, WithdrawStatus::Pending | WithdrawStatus::Rejected)
            }
            WithdrawStatus::Processing => {
                matches!(to, WithdrawStatus::Completed | WithdrawStatus::Failed)
            }
            WithdrawStatus::Completed | WithdrawStatus::Failed | WithdrawStatus::Rejected => false,
        };

        if valid {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                from: from.as_str(),
                to: to.as_str(),
            })
        }
    }
}

/// 提现申请记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: i64,
    pub user_id: i64,
    pub chain_id: i64,
    pub asset_id: i64,
    pub amount: Decimal,
    pub to_address: String,
    pub fee: Decimal,
    /// 风险分快照（0-100）
    pub risk_score: u8,
    pub status: WithdrawStatus,
    pub admin_notes: Option<String>,
    pub tx_hash: Option<String>,
    pub ledger_entry_id: Option<i64>,
    /// 最早可结算时间（创建时间 + hold_hours）
    pub settle_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawRequest {
    /// 完成后应写入账本的 KUSD 变动：-(amount + fee)
    pub fn settlement_delta(&self) -> Decimal {
        -(self.amount + self.fee)
    }
}

/// 待写入的提现申请
#[derive(Debug, Clone, PartialEq)]
pub struct NewWithdrawRequest {
    pub user_id: i64,
    pub chain_id: i64,
    pub asset_id: i64,
    pub amount: Decimal,
    pub to_address: String,
    pub fee: Decimal,
    pub risk_score: u8,
    pub status: WithdrawStatus,
    pub settle_after: DateTime<Utc>,
}

/// 状态更新（结算 worker 使用）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub admin_notes: Option<String>,
    pub tx_hash: Option<String>,
    pub ledger_entry_id: Option<i64>,
}
