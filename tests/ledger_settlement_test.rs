//! 账本一致性与结算流程测试（内存存储）

mod common;

use common::{create_test_app_state, seeded_store, ASSET, CHAIN, DEST};
use kusdcore::{
    domain::{EntryKind, NewLedgerEntry, WithdrawStatus},
    error::CoreError,
    service::Recorded,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn deposit(user_id: i64, amount: Decimal, tx_hash: &str) -> NewLedgerEntry {
    NewLedgerEntry::new(user_id, EntryKind::Deposit, amount, amount)
        .with_chain_asset(1, 1)
        .with_ref_tx_hash(tx_hash)
}

#[tokio::test]
async fn test_duplicate_deposit_is_recorded_once() {
    let store = seeded_store();
    let state = create_test_app_state(store.clone());

    let first = state
        .ledger
        .record(deposit(7, dec!(1000), "0xdeposit-1"))
        .await
        .unwrap();
    let Recorded::Inserted(entry) = &first else {
        panic!("first delivery must insert");
    };

    let second = state
        .ledger
        .record(deposit(7, dec!(1000), "0xdeposit-1"))
        .await
        .unwrap();
    assert_eq!(second, Recorded::AlreadyRecorded(entry.id));

    assert_eq!(store.ledger_entries().len(), 1);
    assert_eq!(state.ledger.balance(7).await.unwrap(), dec!(1000));
}

#[tokio::test]
async fn test_balances_are_isolated_per_user() {
    let store = seeded_store();
    let state = create_test_app_state(store);

    state.ledger.record(deposit(7, dec!(250), "0xa")).await.unwrap();
    state.ledger.record(deposit(8, dec!(75.5), "0xb")).await.unwrap();
    state
        .ledger
        .record(NewLedgerEntry::new(7, EntryKind::Yield, dec!(1.25), dec!(1.25)))
        .await
        .unwrap();

    assert_eq!(state.ledger.balance(7).await.unwrap(), dec!(251.25));
    assert_eq!(state.ledger.balance(8).await.unwrap(), dec!(75.5));
    assert_eq!(state.ledger.balance(9).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn test_admitted_withdrawal_settles_into_single_debit() {
    let store = seeded_store();
    let state = create_test_app_state(store.clone());
    state
        .ledger
        .record(deposit(7, dec!(2000), "0xfunding"))
        .await
        .unwrap();

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "500", DEST)
        .await
        .unwrap();
    assert_eq!(outcome.status, WithdrawStatus::Pending);
    // 准入后余额不变
    assert_eq!(state.ledger.balance(7).await.unwrap(), dec!(2000));

    state
        .settlement
        .start_processing(outcome.request_id)
        .await
        .unwrap();

    // 重复调度幂等
    let again = state
        .settlement
        .start_processing(outcome.request_id)
        .await
        .unwrap();
    assert_eq!(again.status, WithdrawStatus::Processing);

    // 未完成前不能标记失败以外的终态
    assert!(matches!(
        state.settlement.release_review(outcome.request_id).await,
        Err(CoreError::InvalidTransition { .. })
    ));

    let completed = state
        .settlement
        .complete(outcome.request_id, "0xsettlement-1")
        .await
        .unwrap();
    assert_eq!(completed.status, WithdrawStatus::Completed);
    assert_eq!(completed.tx_hash.as_deref(), Some("0xsettlement-1"));

    // 回执重放
    state
        .settlement
        .complete(outcome.request_id, "0xsettlement-1")
        .await
        .unwrap();

    assert_eq!(state.ledger.balance(7).await.unwrap(), dec!(1499.5));
    let debits: Vec<_> = store
        .ledger_entries()
        .into_iter()
        .filter(|e| e.kind == EntryKind::Withdraw)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].kusd_delta, dec!(-500.5));
}

#[tokio::test]
async fn test_held_withdrawal_cannot_start_before_review() {
    let store = seeded_store();
    let state = create_test_app_state(store);

    // 未 KYC 且超过 KYC 限额：挂起人工审核
    let outcome = state
        .admission
        .submit(8, CHAIN, ASSET, "5000", DEST)
        .await
        .unwrap();
    assert_eq!(outcome.status, WithdrawStatus::PendingReview);

    assert!(matches!(
        state.settlement.start_processing(outcome.request_id).await,
        Err(CoreError::InvalidTransition { .. })
    ));

    let released = state
        .settlement
        .release_review(outcome.request_id)
        .await
        .unwrap();
    assert_eq!(released.status, WithdrawStatus::Pending);

    // 24 小时冷却期内不得进入处理
    assert!(matches!(
        state.settlement.start_processing(outcome.request_id).await,
        Err(CoreError::InvalidParameter(_))
    ));
}

#[tokio::test]
async fn test_records_paginate_newest_first_and_filter_by_kind() {
    let store = seeded_store();
    let state = create_test_app_state(store);

    for i in 0..5 {
        state
            .ledger
            .record(deposit(7, Decimal::from(10 + i), &format!("0xdep-{}", i)))
            .await
            .unwrap();
    }
    state
        .ledger
        .record(NewLedgerEntry::new(7, EntryKind::Fee, dec!(1), dec!(-1)))
        .await
        .unwrap();

    let page = state.records.list(7, None, None, Some(4)).await.unwrap();
    assert_eq!(page.records.len(), 4);
    assert_eq!(page.records[0].kind, EntryKind::Fee);
    let cursor = page.next_cursor.expect("more records");

    let rest = state
        .records
        .list(7, None, Some(&cursor), Some(4))
        .await
        .unwrap();
    assert_eq!(rest.records.len(), 2);
    assert!(rest.next_cursor.is_none());

    let deposits = state
        .records
        .list(7, Some(EntryKind::Deposit), None, None)
        .await
        .unwrap();
    assert_eq!(deposits.records.len(), 5);
    assert!(deposits.records.iter().all(|r| r.kind == EntryKind::Deposit));
    assert_eq!(deposits.records[0].tx_hash.as_deref(), Some("0xdep-4"));

    // 其他用户看不到
    let other = state.records.list(8, None, None, None).await.unwrap();
    assert!(other.records.is_empty());
}

#[tokio::test]
async fn test_deposit_address_is_stable_per_user_chain_asset() {
    let store = seeded_store();
    let state = create_test_app_state(store);

    let first = state
        .deposit_addresses
        .get_or_create(7, CHAIN, ASSET)
        .await
        .unwrap();
    assert!(first.fresh);
    assert_eq!(first.min_amount, dec!(10));

    let again = state
        .deposit_addresses
        .get_or_create(7, "Ethereum", "usdt")
        .await
        .unwrap();
    assert!(!again.fresh);
    assert_eq!(again.address, first.address);

    let other = state
        .deposit_addresses
        .get_or_create(8, CHAIN, ASSET)
        .await
        .unwrap();
    assert_ne!(other.address, first.address);

    assert!(matches!(
        state.deposit_addresses.get_or_create(7, "tron", ASSET).await,
        Err(CoreError::NotFound(_))
    ));
}
