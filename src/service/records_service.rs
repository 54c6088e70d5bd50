//! 账本记录与提现申请查询（游标分页）
//!
//! 游标是偏移量十进制字符串的 base64，对调用方不透明。每次多取一条判断是否
//! 还有下一页。无法解析的游标从头开始。

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    domain::{EntryKind, LedgerEntry, WithdrawRequest},
    error::CoreResult,
    infrastructure::timeout::bounded,
    repository::{LedgerStore, WithdrawRequestStore},
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordItem {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub amount: Decimal,
    pub kusd_delta: Decimal,
    pub chain_id: Option<i64>,
    pub asset_id: Option<i64>,
    pub tx_hash: Option<String>,
    pub proof_root: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for RecordItem {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            amount: entry.amount,
            kusd_delta: entry.kusd_delta,
            chain_id: entry.chain_id,
            asset_id: entry.asset_id,
            tx_hash: entry.ref_tx_hash,
            proof_root: entry.proof_root,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsPage {
    pub records: Vec<RecordItem>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalsPage {
    pub withdrawals: Vec<WithdrawRequest>,
    pub next_cursor: Option<String>,
}

pub fn encode_cursor(offset: i64) -> String {
    STANDARD.encode(offset.to_string())
}

/// 解码失败返回 0
pub fn decode_cursor(cursor: &str) -> i64 {
    STANDARD
        .decode(cursor)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|offset| *offset >= 0)
        .unwrap_or(0)
}

pub struct RecordsService {
    ledger: Arc<dyn LedgerStore>,
    withdrawals: Arc<dyn WithdrawRequestStore>,
    max_page_size: i64,
    store_timeout: Duration,
}

impl RecordsService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        withdrawals: Arc<dyn WithdrawRequestStore>,
        max_page_size: i64,
        store_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            withdrawals,
            max_page_size,
            store_timeout,
        }
    }

    /// (offset, limit)
    fn window(&self, cursor: Option<&str>, limit: Option<i64>) -> (i64, i64) {
        let offset = cursor.map(decode_cursor).unwrap_or(0);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, self.max_page_size.max(1));
        (offset, limit)
    }

    pub async fn list(
        &self,
        user_id: i64,
        kind: Option<EntryKind>,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> CoreResult<RecordsPage> {
        let (offset, limit) = self.window(cursor, limit);

        let mut entries = bounded(
            self.store_timeout,
            "ledger.list_by_user",
            self.ledger.list_by_user(user_id, kind, offset, limit + 1),
        )
        .await?;

        let has_more = entries.len() as i64 > limit;
        entries.truncate(limit as usize);

        Ok(RecordsPage {
            records: entries.into_iter().map(RecordItem::from).collect(),
            next_cursor: has_more.then(|| encode_cursor(offset + limit)),
        })
    }

    /// 用户的提现申请，最新在前
    pub async fn list_withdrawals(
        &self,
        user_id: i64,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> CoreResult<WithdrawalsPage> {
        let (offset, limit) = self.window(cursor, limit);

        let mut withdrawals = bounded(
            self.store_timeout,
            "withdraw.list_by_user",
            self.withdrawals.list_by_user(user_id, offset, limit + 1),
        )
        .await?;

        let has_more = withdrawals.len() as i64 > limit;
        withdrawals.truncate(limit as usize);

        Ok(WithdrawalsPage {
            withdrawals,
            next_cursor: has_more.then(|| encode_cursor(offset + limit)),
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        domain::{NewLedgerEntry, NewWithdrawRequest, WithdrawStatus},
        repository::InMemoryStore,
    };

    #[test]
    fn test_cursor_round_trip_and_garbage() {
        assert_eq!(decode_cursor(&encode_cursor(40)), 40);
        assert_eq!(decode_cursor("not base64!!"), 0);
        assert_eq!(decode_cursor(&STANDARD.encode("-5")), 0);
    }

    #[tokio::test]
    async fn test_pages_walk_newest_first() {
        let store = Arc::new(InMemoryStore::new());
        for i in 1..=5 {
            store
                .append(NewLedgerEntry::new(
                    1,
                    EntryKind::Deposit,
                    Decimal::from(i),
                    Decimal::from(i),
                ))
                .await
                .unwrap();
        }
        store
            .append(NewLedgerEntry::new(2, EntryKind::Deposit, dec!(99), dec!(99)))
            .await
            .unwrap();

        let service = RecordsService::new(store.clone(), store, 100, Duration::from_millis(200));

        let first = service.list(1, None, None, Some(2)).await.unwrap();
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].amount, dec!(5));
        let cursor = first.next_cursor.expect("more pages");

        let second = service.list(1, None, Some(&cursor), Some(2)).await.unwrap();
        assert_eq!(second.records[0].amount, dec!(3));

        let last = service
            .list(1, None, second.next_cursor.as_deref(), Some(2))
            .await
            .unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_kind_filter_and_page_cap() {
        let store = Arc::new(InMemoryStore::new());
        store
            .append(NewLedgerEntry::new(1, EntryKind::Deposit, dec!(10), dec!(10)))
            .await
            .unwrap();
        store
            .append(NewLedgerEntry::new(1, EntryKind::Fee, dec!(1), dec!(-1)))
            .await
            .unwrap();

        let service = RecordsService::new(store.clone(), store, 1, Duration::from_millis(200));
        let page = service
            .list(1, Some(EntryKind::Fee), None, Some(50))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].kind, EntryKind::Fee);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_withdrawals_listed_per_user_newest_first() {
        let store = Arc::new(InMemoryStore::new());
        for (user_id, amount) in [(1, dec!(10)), (2, dec!(20)), (1, dec!(30)), (1, dec!(40))] {
            store
                .create(NewWithdrawRequest {
                    user_id,
                    chain_id: 1,
                    asset_id: 1,
                    amount,
                    to_address: "0x3333333333333333333333333333333333333333".into(),
                    fee: Decimal::ZERO,
                    risk_score: 0,
                    status: WithdrawStatus::Pending,
                    settle_after: Utc::now(),
                })
                .await
                .unwrap();
        }

        let service = RecordsService::new(store.clone(), store, 100, Duration::from_millis(200));

        let first = service.list_withdrawals(1, None, Some(2)).await.unwrap();
        let amounts: Vec<_> = first.withdrawals.iter().map(|w| w.amount).collect();
        assert_eq!(amounts, vec![dec!(40), dec!(30)]);

        let rest = service
            .list_withdrawals(1, first.next_cursor.as_deref(), Some(2))
            .await
            .unwrap();
        assert_eq!(rest.withdrawals.len(), 1);
        assert_eq!(rest.withdrawals[0].amount, dec!(10));
        assert!(rest.next_cursor.is_none());

        let other = service.list_withdrawals(2, None, None).await.unwrap();
        assert_eq!(other.withdrawals.len(), 1);
        assert!(other.withdrawals.iter().all(|w| w.user_id == 2));
    }
}
