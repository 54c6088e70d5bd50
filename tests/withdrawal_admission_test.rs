//! 提现准入端到端测试（内存存储）

mod common;

use std::time::Duration;

use common::{blacklist, create_test_app_state, past_withdrawal, seeded_store, ASSET, CHAIN, DEST};
use kusdcore::{
    domain::{RiskRule, WithdrawStatus},
    error::CoreError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_small_withdrawal_is_admitted_immediately() {
    let store = seeded_store();
    let state = create_test_app_state(store.clone());

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "500", DEST)
        .await
        .unwrap();

    assert_eq!(outcome.risk_check.score, 0);
    assert!(outcome.risk_check.approved);
    assert_eq!(outcome.risk_check.hold_hours, 0);
    assert_eq!(outcome.status, WithdrawStatus::Pending);
    assert_eq!(outcome.fee, dec!(0.5));

    let rows = store.withdrawals();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, outcome.request_id);
    assert_eq!(rows[0].amount, dec!(500));
    // 准入不写账本
    assert!(store.ledger_entries().is_empty());
}

#[tokio::test]
async fn test_daily_limit_reports_remaining_allowance() {
    let store = seeded_store();
    store.mark_kyc_verified(7);
    past_withdrawal(
        &store,
        7,
        dec!(48000),
        chrono::Duration::hours(2),
        WithdrawStatus::Completed,
    );
    let state = create_test_app_state(store.clone());

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "3000", DEST)
        .await
        .unwrap();

    let decision = &outcome.risk_check;
    assert!(!decision.approved);
    assert!(decision.has_rule(RiskRule::DailyLimitExceeded));
    assert_eq!(decision.max_allowed_amount, Some(dec!(2000)));
    assert_eq!(decision.hold_hours, 24);
    assert!(decision.requires_manual_review);
    assert_eq!(outcome.status, WithdrawStatus::PendingReview);
}

#[tokio::test]
async fn test_unverified_user_above_kyc_limit_is_flagged() {
    let store = seeded_store();
    let state = create_test_app_state(store);

    let outcome = state
        .admission
        .submit(8, CHAIN, ASSET, "5000", DEST)
        .await
        .unwrap();

    assert!(outcome.risk_check.requires_kyc);
    assert!(outcome.risk_check.has_rule(RiskRule::KycRequired));
    assert!(!outcome.risk_check.approved);
}

#[tokio::test]
async fn test_blacklisted_destination_is_rejected_and_recorded() {
    let store = seeded_store();
    let flagged = "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd";
    // 黑名单匹配不区分大小写
    blacklist(&store, "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD");
    let state = create_test_app_state(store.clone());

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "10", flagged)
        .await
        .unwrap();

    assert_eq!(outcome.risk_check.score, 100);
    assert!(!outcome.risk_check.approved);
    assert!(outcome.risk_check.has_rule(RiskRule::BlacklistedAddress));
    assert_eq!(outcome.status, WithdrawStatus::Rejected);

    let rows = store.withdrawals();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, WithdrawStatus::Rejected);
    assert_eq!(rows[0].risk_score, 100);
}

#[tokio::test]
async fn test_rejected_requests_do_not_consume_daily_limit() {
    let store = seeded_store();
    store.mark_kyc_verified(7);
    past_withdrawal(
        &store,
        7,
        dec!(45000),
        chrono::Duration::hours(2),
        WithdrawStatus::Rejected,
    );
    let state = create_test_app_state(store);

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "5000", DEST)
        .await
        .unwrap();

    assert!(!outcome.risk_check.has_rule(RiskRule::DailyLimitExceeded));
    assert!(outcome.risk_check.approved);
}

#[tokio::test]
async fn test_concurrent_requests_cannot_both_pass_daily_limit() {
    let store = seeded_store();
    store.mark_kyc_verified(7);
    let state = create_test_app_state(store.clone());

    let first = {
        let state = state.clone();
        tokio::spawn(async move { state.admission.submit(7, CHAIN, ASSET, "30000", DEST).await })
    };
    let second = {
        let state = state.clone();
        tokio::spawn(async move { state.admission.submit(7, CHAIN, ASSET, "30000", DEST).await })
    };

    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    let approved = outcomes.iter().filter(|o| o.risk_check.approved).count();
    assert_eq!(approved, 1);

    let blocked = outcomes
        .iter()
        .find(|o| !o.risk_check.approved)
        .expect("one request must be held");
    assert!(blocked.risk_check.has_rule(RiskRule::DailyLimitExceeded));
    assert_eq!(blocked.risk_check.max_allowed_amount, Some(dec!(20000)));
    assert_eq!(store.withdrawals().len(), 2);
}

#[tokio::test]
async fn test_users_do_not_share_limits() {
    let store = seeded_store();
    store.mark_kyc_verified(7);
    store.mark_kyc_verified(8);
    past_withdrawal(
        &store,
        7,
        dec!(49000),
        chrono::Duration::hours(2),
        WithdrawStatus::Completed,
    );
    let state = create_test_app_state(store);

    let outcome = state
        .admission
        .submit(8, CHAIN, ASSET, "2000", DEST)
        .await
        .unwrap();
    assert_eq!(outcome.risk_check.score, 0);
}

#[tokio::test]
async fn test_store_timeout_aborts_without_persisting() {
    let store = seeded_store();
    let state = create_test_app_state(store.clone());
    store.set_latency(Duration::from_millis(500));

    let result = state.admission.submit(7, CHAIN, ASSET, "500", DEST).await;
    assert!(matches!(result, Err(CoreError::Timeout { .. })));

    store.set_latency(Duration::ZERO);
    assert!(store.withdrawals().is_empty());
}

#[tokio::test]
async fn test_store_failure_aborts_without_persisting() {
    let store = seeded_store();
    let state = create_test_app_state(store.clone());
    store.set_failing(true);

    let result = state.admission.submit(7, CHAIN, ASSET, "500", DEST).await;
    let err = result.unwrap_err();
    assert!(matches!(err, CoreError::Store(_)));
    assert!(err.is_internal());
    assert!(store.withdrawals().is_empty());
}

#[tokio::test]
async fn test_validation_failures() {
    let store = seeded_store();
    let state = create_test_app_state(store.clone());

    assert!(matches!(
        state.admission.submit(7, "solana", ASSET, "10", DEST).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        state.admission.submit(7, CHAIN, "DOGE", "10", DEST).await,
        Err(CoreError::NotFound(_))
    ));
    for amount in ["0", "-1", "ten", "1.0000001"] {
        assert!(
            matches!(
                state.admission.submit(7, CHAIN, ASSET, amount, DEST).await,
                Err(CoreError::InvalidAmount(_))
            ),
            "{} should be rejected",
            amount
        );
    }
    let non_hex = format!("0xZZ{}", "1".repeat(38));
    let missing_prefix = "1".repeat(40);
    let zero = format!("0x{}", "0".repeat(40));
    for address in ["0x123", missing_prefix.as_str(), zero.as_str(), non_hex.as_str()] {
        assert!(
            matches!(
                state.admission.submit(7, CHAIN, ASSET, "10", address).await,
                Err(CoreError::InvalidAddress(_))
            ),
            "{} should be rejected",
            address
        );
    }

    assert!(store.withdrawals().is_empty());
}

#[tokio::test]
async fn test_risk_config_overrides_default_threshold() {
    let store = seeded_store();
    store.mark_kyc_verified(7);
    store.set_config("max_daily_withdrawal", "1000");
    past_withdrawal(
        &store,
        7,
        dec!(1200),
        chrono::Duration::hours(3),
        WithdrawStatus::Completed,
    );
    let state = create_test_app_state(store);

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "100", DEST)
        .await
        .unwrap();
    assert!(outcome.risk_check.has_rule(RiskRule::DailyLimitExceeded));
    // 已超限时剩余额度为 0，不为负
    assert_eq!(outcome.risk_check.max_allowed_amount, Some(Decimal::ZERO));
}

#[tokio::test]
async fn test_delayed_approval_settles_without_review() {
    let store = seeded_store();
    store.mark_kyc_verified(7);
    for minutes in [5, 15, 30] {
        past_withdrawal(
            &store,
            7,
            dec!(100),
            chrono::Duration::minutes(minutes),
            WithdrawStatus::Completed,
        );
    }
    let state = create_test_app_state(store.clone());

    let outcome = state
        .admission
        .submit(7, CHAIN, ASSET, "100", DEST)
        .await
        .unwrap();

    assert_eq!(outcome.risk_check.score, 30);
    assert!(outcome.risk_check.approved);
    assert_eq!(outcome.risk_check.hold_hours, 1);
    assert!(!outcome.risk_check.requires_manual_review);
    // 延迟结算不进入人工审核队列
    assert_eq!(outcome.status, WithdrawStatus::Pending);
    assert!(outcome.settle_after > chrono::Utc::now() + chrono::Duration::minutes(59));

    // 冷却期内结算 worker 拿不到
    assert!(matches!(
        state.settlement.start_processing(outcome.request_id).await,
        Err(CoreError::InvalidParameter(_))
    ));
}
