//! 提现准入
//!
//! 校验 -> 加用户锁 -> 风控评分 -> 落库 -> 释放锁。评分与落库必须在同一把锁内，
//! 否则同一用户的两个并发请求都看不到对方占用的日额度。
//!
//! 准入从不写账本，扣款发生在结算完成时（见 `SettlementService::complete`）。

use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    config::WithdrawalSettings,
    domain::{NewWithdrawRequest, RiskDecision, WithdrawStatus},
    error::{CoreError, CoreResult},
    infrastructure::{log_redact::redact_address, timeout::bounded, user_lock::UserLocks},
    repository::WithdrawRequestStore,
    service::{catalog::ChainCatalog, withdrawal_risk_control::RiskScoringEngine},
    utils::AddressValidator,
};

/// 提现提交结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawOutcome {
    pub request_id: i64,
    pub status: WithdrawStatus,
    pub fee: Decimal,
    pub settle_after: DateTime<Utc>,
    pub risk_check: RiskDecision,
}

/// 决策 -> 落库状态
///
/// 通过但带冷却期的申请仍落为 pending，冷却由 `settle_after` 约束。
pub fn initial_status(decision: &RiskDecision) -> WithdrawStatus {
    if decision.approved {
        WithdrawStatus::Pending
    } else if decision.requires_manual_review {
        WithdrawStatus::PendingReview
    } else {
        WithdrawStatus::Rejected
    }
}

/// 解析金额：必须是正的十进制数，且精度不超过资产小数位
pub fn parse_amount(raw: &str, decimals: i32) -> CoreResult<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| CoreError::InvalidAmount(format!("'{}' is not a decimal", raw)))?;

    if amount <= Decimal::ZERO {
        return Err(CoreError::InvalidAmount(
            "amount must be greater than zero".into(),
        ));
    }

    let max_scale = decimals.max(0) as u32;
    if amount.normalize().scale() > max_scale {
        return Err(CoreError::InvalidAmount(format!(
            "amount has more than {} decimal places",
            max_scale
        )));
    }

    Ok(amount)
}

pub struct WithdrawalAdmissionController {
    catalog: Arc<ChainCatalog>,
    engine: Arc<RiskScoringEngine>,
    withdrawals: Arc<dyn WithdrawRequestStore>,
    locks: Arc<UserLocks>,
    fee_rate: Decimal,
    store_timeout: Duration,
}

impl WithdrawalAdmissionController {
    pub fn new(
        catalog: Arc<ChainCatalog>,
        engine: Arc<RiskScoringEngine>,
        withdrawals: Arc<dyn WithdrawRequestStore>,
        locks: Arc<UserLocks>,
        settings: &WithdrawalSettings,
        store_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            engine,
            withdrawals,
            locks,
            fee_rate: settings.fee_rate,
            store_timeout,
        }
    }

    pub async fn submit(
        &self,
        user_id: i64,
        chain_key: &str,
        asset_symbol: &str,
        amount: &str,
        to_address: &str,
    ) -> CoreResult<WithdrawOutcome> {
        let (chain, asset) = self.catalog.resolve(chain_key, asset_symbol).await?;
        let amount = parse_amount(amount, asset.decimals)?;
        AddressValidator::validate_evm(to_address)?;

        let _guard = self.locks.lock(user_id).await?;

        let decision = self
            .engine
            .assess_withdrawal(user_id, amount, to_address, chain.id)
            .await?;

        let status = initial_status(&decision);
        let fee = (amount * self.fee_rate).round_dp(asset.decimals.max(0) as u32);
        let settle_after = Utc::now() + chrono::Duration::hours(i64::from(decision.hold_hours));

        let request = bounded(
            self.store_timeout,
            "withdraw.create",
            self.withdrawals.create(NewWithdrawRequest {
                user_id,
                chain_id: chain.id,
                asset_id: asset.id,
                amount,
                to_address: to_address.to_string(),
                fee,
                risk_score: decision.score,
                status,
                settle_after,
            }),
        )
        .await?;

        tracing::info!(
            request_id = request.id,
            user_id = user_id,
            chain = %chain.chain_key,
            asset = %asset.symbol,
            amount = %amount,
            to_address = %redact_address(to_address),
            status = status.as_str(),
            risk_score = decision.score,
            "Withdrawal request admitted"
        );

        Ok(WithdrawOutcome {
            request_id: request.id,
            status,
            fee,
            settle_after,
            risk_check: decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::RiskReason;

    fn decision(approved: bool, hold_hours: u32, manual: bool) -> RiskDecision {
        RiskDecision {
            score: 0,
            reasons: Vec::<RiskReason>::new(),
            requires_kyc: false,
            max_allowed_amount: None,
            approved,
            hold_hours,
            requires_manual_review: manual,
        }
    }

    #[test]
    fn test_initial_status_mapping() {
        assert_eq!(initial_status(&decision(true, 0, false)), WithdrawStatus::Pending);
        assert_eq!(initial_status(&decision(true, 1, false)), WithdrawStatus::Pending);
        assert_eq!(
            initial_status(&decision(false, 24, true)),
            WithdrawStatus::PendingReview
        );
        assert_eq!(
            initial_status(&decision(false, 0, false)),
            WithdrawStatus::Rejected
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.50 ", 6).unwrap(), dec!(12.50));
        assert_eq!(parse_amount("1.000000000", 6).unwrap(), dec!(1));
        for bad in ["0", "-3", "abc", "", "0.0000001"] {
            assert!(
                matches!(parse_amount(bad, 6), Err(CoreError::InvalidAmount(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
