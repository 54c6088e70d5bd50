//! 账本服务
//!
//! 外部事件（充值确认、结算回执）重复上报是常态：同一 ref_tx_hash 的第二次
//! 写入返回 `Recorded::AlreadyRecorded`，调用方按成功处理。

use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;

use crate::{
    domain::{LedgerEntry, NewLedgerEntry},
    error::{CoreError, CoreResult},
    infrastructure::{log_redact::redact_tx_hash, timeout::bounded},
    repository::LedgerStore,
};

/// 写入结果
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Inserted(LedgerEntry),
    /// 该外部事件已入账，附已有记录 id
    AlreadyRecorded(i64),
}

impl Recorded {
    pub fn entry_id(&self) -> i64 {
        match self {
            Recorded::Inserted(entry) => entry.id,
            Recorded::AlreadyRecorded(id) => *id,
        }
    }
}

pub struct LedgerService {
    ledger: Arc<dyn LedgerStore>,
    store_timeout: Duration,
}

impl LedgerService {
    pub fn new(ledger: Arc<dyn LedgerStore>, store_timeout: Duration) -> Self {
        Self {
            ledger,
            store_timeout,
        }
    }

    pub async fn record(&self, entry: NewLedgerEntry) -> CoreResult<Recorded> {
        let user_id = entry.user_id;
        let kind = entry.kind;

        match bounded(self.store_timeout, "ledger.append", self.ledger.append(entry)).await {
            Ok(inserted) => {
                tracing::info!(
                    user_id = user_id,
                    entry_id = inserted.id,
                    kind = kind.as_str(),
                    kusd_delta = %inserted.kusd_delta,
                    "Ledger entry recorded"
                );
                Ok(Recorded::Inserted(inserted))
            }
            Err(CoreError::DuplicateReference {
                ref_tx_hash,
                existing_id,
            }) => {
                tracing::info!(
                    user_id = user_id,
                    ref_tx_hash = %redact_tx_hash(&ref_tx_hash, 6),
                    existing_id = existing_id,
                    "Ledger reference already recorded, skipping"
                );
                Ok(Recorded::AlreadyRecorded(existing_id))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_by_ref(&self, ref_tx_hash: &str) -> CoreResult<Option<LedgerEntry>> {
        bounded(
            self.store_timeout,
            "ledger.find_by_ref",
            self.ledger.find_by_ref(ref_tx_hash),
        )
        .await
    }

    /// 用户 KUSD 余额
    pub async fn balance(&self, user_id: i64) -> CoreResult<Decimal> {
        bounded(
            self.store_timeout,
            "ledger.balance_of",
            self.ledger.balance_of(user_id),
        )
        .await
    }
}
