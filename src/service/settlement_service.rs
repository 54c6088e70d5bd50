//! 提现结算辅助（供结算 worker 与运营审核调用）
//!
//! 状态变更一律走 `WithdrawStatus::validate_transition` 再做比较并交换，
//! 并发的两个 worker 只有一个能推进同一笔申请。完成时写入唯一一条
//! `-(amount + fee)` 的账本记录，以链上 tx_hash 作为幂等键。

use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    domain::{
        EntryKind, LedgerEntry, NewLedgerEntry, StatusUpdate, WithdrawRequest, WithdrawStatus,
    },
    error::{CoreError, CoreResult},
    infrastructure::{log_redact::redact_tx_hash, timeout::bounded},
    repository::WithdrawRequestStore,
    service::ledger_service::{LedgerService, Recorded},
};

/// 账本记录是否就是该申请的结算扣款
fn is_settlement_of(entry: &LedgerEntry, request: &WithdrawRequest) -> bool {
    entry.user_id == request.user_id
        && entry.kind == EntryKind::Withdraw
        && entry.chain_id == Some(request.chain_id)
        && entry.asset_id == Some(request.asset_id)
        && entry.kusd_delta == request.settlement_delta()
}

pub struct SettlementService {
    withdrawals: Arc<dyn WithdrawRequestStore>,
    ledger: Arc<LedgerService>,
    store_timeout: Duration,
}

impl SettlementService {
    pub fn new(
        withdrawals: Arc<dyn WithdrawRequestStore>,
        ledger: Arc<LedgerService>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            withdrawals,
            ledger,
            store_timeout,
        }
    }

    pub async fn find(&self, id: i64) -> CoreResult<WithdrawRequest> {
        bounded(
            self.store_timeout,
            "withdraw.find_by_id",
            self.withdrawals.find_by_id(id),
        )
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("withdraw request {}", id)))
    }

    /// pending -> processing，冷却期未结束时拒绝
    pub async fn start_processing(&self, id: i64) -> CoreResult<WithdrawRequest> {
        let request = self.find(id).await?;
        if request.status == WithdrawStatus::Pending && request.settle_after > Utc::now() {
            return Err(CoreError::InvalidParameter(format!(
                "withdraw request {} is on hold until {}",
                id, request.settle_after
            )));
        }
        self.advance(request, WithdrawStatus::Processing, StatusUpdate::default())
            .await
    }

    /// processing -> completed，写入结算账本记录并关联
    pub async fn complete(&self, id: i64, tx_hash: &str) -> CoreResult<WithdrawRequest> {
        let request = self.find(id).await?;
        if request.status == WithdrawStatus::Completed {
            return Ok(request);
        }
        WithdrawStatus::validate_transition(request.status, WithdrawStatus::Completed)?;

        let entry = NewLedgerEntry::new(
            request.user_id,
            EntryKind::Withdraw,
            -request.amount,
            request.settlement_delta(),
        )
        .with_chain_asset(request.chain_id, request.asset_id)
        .with_ref_tx_hash(tx_hash);
        let ledger_entry_id = match self.ledger.record(entry).await? {
            Recorded::Inserted(inserted) => inserted.id,
            // 上次写账本后未来得及推进状态；只认本笔申请自己的扣款
            Recorded::AlreadyRecorded(existing_id) => {
                match self.ledger.find_by_ref(tx_hash).await? {
                    Some(existing) if is_settlement_of(&existing, &request) => existing.id,
                    _ => {
                        tracing::warn!(
                            request_id = request.id,
                            user_id = request.user_id,
                            tx_hash = %redact_tx_hash(tx_hash, 6),
                            existing_id = existing_id,
                            "Settlement tx hash already belongs to another ledger entry"
                        );
                        return Err(CoreError::DuplicateReference {
                            ref_tx_hash: tx_hash.to_string(),
                            existing_id,
                        });
                    }
                }
            }
        };

        let completed = self
            .advance(
                request,
                WithdrawStatus::Completed,
                StatusUpdate {
                    tx_hash: Some(tx_hash.to_string()),
                    ledger_entry_id: Some(ledger_entry_id),
                    ..StatusUpdate::default()
                },
            )
            .await?;

        tracing::info!(
            request_id = completed.id,
            user_id = completed.user_id,
            tx_hash = %redact_tx_hash(tx_hash, 6),
            ledger_entry_id = ledger_entry_id,
            "Withdrawal settled"
        );

        Ok(completed)
    }

    /// processing -> failed，不产生账本记录
    pub async fn fail(&self, id: i64, note: &str) -> CoreResult<WithdrawRequest> {
        let request = self.find(id).await?;
        self.advance(
            request,
            WithdrawStatus::Failed,
            StatusUpdate {
                admin_notes: Some(note.to_string()),
                ..StatusUpdate::default()
            },
        )
        .await
    }

    /// 人工审核通过：pending_review -> pending
    pub async fn release_review(&self, id: i64) -> CoreResult<WithdrawRequest> {
        let request = self.find(id).await?;
        self.advance(request, WithdrawStatus::Pending, StatusUpdate::default())
            .await
    }

    /// 人工审核拒绝：pending_review -> rejected
    pub async fn reject_review(&self, id: i64, note: &str) -> CoreResult<WithdrawRequest> {
        let request = self.find(id).await?;
        if request.status != WithdrawStatus::PendingReview && request.status != WithdrawStatus::Rejected {
            return Err(CoreError::InvalidTransition {
                from: request.status.as_str(),
                to: WithdrawStatus::Rejected.as_str(),
            });
        }
        self.advance(
            request,
            WithdrawStatus::Rejected,
            StatusUpdate {
                admin_notes: Some(note.to_string()),
                ..StatusUpdate::default()
            },
        )
        .await
    }

    async fn advance(
        &self,
        request: WithdrawRequest,
        to: WithdrawStatus,
        update: StatusUpdate,
    ) -> CoreResult<WithdrawRequest> {
        WithdrawStatus::validate_transition(request.status, to)?;
        if request.status == to {
            return Ok(request);
        }

        let updated = bounded(
            self.store_timeout,
            "withdraw.transition",
            self.withdrawals.transition(request.id, request.status, to, update),
        )
        .await?;

        match updated {
            Some(row) => {
                tracing::info!(
                    request_id = row.id,
                    from = request.status.as_str(),
                    to = to.as_str(),
                    "Withdraw request transitioned"
                );
                Ok(row)
            }
            // 并发方已推进该申请
            None => Err(CoreError::InvalidTransition {
                from: request.status.as_str(),
                to: to.as_str(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        domain::NewWithdrawRequest,
        repository::{InMemoryStore, LedgerStore},
    };

    fn setup() -> (Arc<InMemoryStore>, SettlementService) {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(LedgerService::new(store.clone(), Duration::from_millis(200)));
        let service = SettlementService::new(store.clone(), ledger, Duration::from_millis(200));
        (store, service)
    }

    fn seed(store: &InMemoryStore, status: WithdrawStatus, hold: chrono::Duration) -> WithdrawRequest {
        let now = Utc::now();
        store.insert_withdrawal_at(
            NewWithdrawRequest {
                user_id: 9,
                chain_id: 1,
                asset_id: 1,
                amount: dec!(1000),
                to_address: "0x2222222222222222222222222222222222222222".into(),
                fee: dec!(1),
                risk_score: 0,
                status,
                settle_after: now + hold,
            },
            now,
        )
    }

    #[tokio::test]
    async fn test_complete_writes_single_ledger_entry() {
        let (store, service) = setup();
        let request = seed(&store, WithdrawStatus::Pending, chrono::Duration::zero());

        service.start_processing(request.id).await.unwrap();
        let done = service.complete(request.id, "0xsettled").await.unwrap();
        assert_eq!(done.status, WithdrawStatus::Completed);
        assert!(done.processed_at.is_some());

        // 重复回执不重复扣款
        let again = service.complete(request.id, "0xsettled").await.unwrap();
        assert_eq!(again.ledger_entry_id, done.ledger_entry_id);

        let entries = store.ledger_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kusd_delta, dec!(-1001));
        assert_eq!(Some(entries[0].id), done.ledger_entry_id);
        assert_eq!(store.balance_of(9).await.unwrap(), dec!(-1001));
    }

    #[tokio::test]
    async fn test_complete_refuses_tx_hash_owned_by_other_entry() {
        let (store, service) = setup();
        store
            .append(
                NewLedgerEntry::new(1, EntryKind::Deposit, dec!(5000), dec!(5000))
                    .with_chain_asset(1, 1)
                    .with_ref_tx_hash("0xabc"),
            )
            .await
            .unwrap();
        let request = seed(&store, WithdrawStatus::Processing, chrono::Duration::zero());

        let result = service.complete(request.id, "0xabc").await;
        assert!(matches!(
            result,
            Err(CoreError::DuplicateReference { existing_id, .. }) if existing_id == 1
        ));

        // 仍停在 processing，用正确回执可以完成
        let row = service.find(request.id).await.unwrap();
        assert_eq!(row.status, WithdrawStatus::Processing);
        assert!(row.ledger_entry_id.is_none());
        assert_eq!(store.balance_of(9).await.unwrap(), Decimal::ZERO);

        let done = service.complete(request.id, "0xdef").await.unwrap();
        assert_eq!(done.status, WithdrawStatus::Completed);
        assert_eq!(store.balance_of(9).await.unwrap(), dec!(-1001));
    }

    #[tokio::test]
    async fn test_complete_links_own_debit_left_by_interrupted_attempt() {
        let (store, service) = setup();
        let request = seed(&store, WithdrawStatus::Processing, chrono::Duration::zero());
        let debit = store
            .append(
                NewLedgerEntry::new(9, EntryKind::Withdraw, dec!(-1000), dec!(-1001))
                    .with_chain_asset(1, 1)
                    .with_ref_tx_hash("0xretry"),
            )
            .await
            .unwrap();

        let done = service.complete(request.id, "0xretry").await.unwrap();
        assert_eq!(done.status, WithdrawStatus::Completed);
        assert_eq!(done.ledger_entry_id, Some(debit.id));
        assert_eq!(store.ledger_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_hold_allows_processing() {
        let (store, service) = setup();
        let request = seed(&store, WithdrawStatus::Pending, chrono::Duration::hours(-2));

        let started = service.start_processing(request.id).await.unwrap();
        assert_eq!(started.status, WithdrawStatus::Processing);
    }

    #[tokio::test]
    async fn test_hold_blocks_processing() {
        let (store, service) = setup();
        let request = seed(&store, WithdrawStatus::Pending, chrono::Duration::hours(1));

        let result = service.start_processing(request.id).await;
        assert!(matches!(result, Err(CoreError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_rejected_never_touches_ledger() {
        let (store, service) = setup();
        let request = seed(&store, WithdrawStatus::PendingReview, chrono::Duration::hours(24));

        let rejected = service.reject_review(request.id, "suspicious").await.unwrap();
        assert_eq!(rejected.status, WithdrawStatus::Rejected);

        assert!(service.release_review(request.id).await.is_err());
        assert!(service.complete(request.id, "0xnope").await.is_err());
        assert!(store.ledger_entries().is_empty());
        assert_eq!(store.balance_of(9).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_settlement_has_no_ledger_effect() {
        let (store, service) = setup();
        let request = seed(&store, WithdrawStatus::Processing, chrono::Duration::zero());

        let failed = service.fail(request.id, "broadcast rejected").await.unwrap();
        assert_eq!(failed.status, WithdrawStatus::Failed);
        assert_eq!(failed.admin_notes.as_deref(), Some("broadcast rejected"));
        assert!(store.ledger_entries().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let (_store, service) = setup();
        assert!(matches!(
            service.start_processing(404).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
