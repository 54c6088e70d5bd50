//! 账本领域模型
//!
//! 账本只追加：每一次余额变动写入一条不可变的 LedgerEntry，
//! 用户余额 = 该用户所有记录 kusd_delta 之和。更正通过追加反向记录完成。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 账本记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Deposit,
    Withdraw,
    Yield,
    Trade,
    Fee,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Withdraw => "withdraw",
            EntryKind::Yield => "yield",
            EntryKind::Trade => "trade",
            EntryKind::Fee => "fee",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.to_lowercase().as_str() {
            "deposit" => Ok(EntryKind::Deposit),
            "withdraw" => Ok(EntryKind::Withdraw),
            "yield" => Ok(EntryKind::Yield),
            "trade" => Ok(EntryKind::Trade),
            "fee" => Ok(EntryKind::Fee),
            other => Err(CoreError::InvalidParameter(format!(
                "unknown ledger entry kind: {}",
                other
            ))),
        }
    }
}

/// 已持久化的账本记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub kind: EntryKind,
    pub chain_id: Option<i64>,
    pub asset_id: Option<i64>,
    /// 原始资产数量（带符号）
    pub amount: Decimal,
    /// KUSD 余额变动（带符号）
    pub kusd_delta: Decimal,
    /// 链上交易哈希，存在时全局唯一
    pub ref_tx_hash: Option<String>,
    pub batch_id: Option<i64>,
    pub proof_root: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 待写入的账本记录
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub kind: EntryKind,
    pub chain_id: Option<i64>,
    pub asset_id: Option<i64>,
    pub amount: Decimal,
    pub kusd_delta: Decimal,
    pub ref_tx_hash: Option<String>,
    pub batch_id: Option<i64>,
    pub proof_root: Option<String>,
}

impl NewLedgerEntry {
    /// 最小构造：其余可选字段为空
    pub fn new(user_id: i64, kind: EntryKind, amount: Decimal, kusd_delta: Decimal) -> Self {
        Self {
            user_id,
            kind,
            chain_id: None,
            asset_id: None,
            amount,
            kusd_delta,
            ref_tx_hash: None,
            batch_id: None,
            proof_root: None,
        }
    }

    pub fn with_ref_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.ref_tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_chain_asset(mut self, chain_id: i64, asset_id: i64) -> Self {
        self.chain_id = Some(chain_id);
        self.asset_id = Some(asset_id);
        self
    }
}
