//! 领域模型：账本、提现申请、风控决策、链与资产

pub mod chain;
pub mod ledger;
pub mod risk;
pub mod withdraw;

pub use chain::{AllocatedAddress, Asset, Chain};
pub use ledger::{EntryKind, LedgerEntry, NewLedgerEntry};
pub use risk::{BlacklistAddress, RiskDecision, RiskReason, RiskRule, ScoreBand};
pub use withdraw::{NewWithdrawRequest, StatusUpdate, WithdrawRequest, WithdrawStatus};
