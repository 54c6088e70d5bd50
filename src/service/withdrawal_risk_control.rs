//! 提现风控评分引擎
//!
//! 多个独立信号叠加为 0-100 的综合分，再按分数区间给出决策：
//!
//! | 分数   | approved | hold_hours | 说明                 |
//! |--------|----------|------------|----------------------|
//! | >= 80  | false    | 0          | 拒绝                 |
//! | 50-79  | false    | 24         | 挂起，等待人工审核   |
//! | 30-49  | true     | 1          | 通过，延迟 1 小时结算 |
//! | < 30   | true     | 0          | 通过                 |
//!
//! 黑名单命中直接返回 100 分，不再执行后续检查。任何一次存储读取失败或超时
//! 都会中止整个评估，绝不在数据不完整时给出通过决策。

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    config::RiskSettings,
    domain::{
        risk::config_keys, EntryKind, RiskDecision, RiskReason, RiskRule, ScoreBand,
    },
    error::CoreResult,
    infrastructure::{log_redact::redact_address, timeout::bounded},
    repository::{ComplianceStore, KycRegistry, LedgerStore, WithdrawRequestStore},
    service::risk_config_cache::CachedRiskConfig,
};

// 信号权重
const BLACKLIST_SCORE: u32 = 100;
const DAILY_LIMIT_EXCEEDED_SCORE: u32 = 50;
const DAILY_LIMIT_APPROACHING_SCORE: u32 = 20;
const KYC_REQUIRED_SCORE: u32 = 70;
const FREQUENT_WITHDRAWALS_SCORE: u32 = 30;
const UNUSUAL_AMOUNT_SCORE: u32 = 40;
const WEEKLY_VELOCITY_SCORE: u32 = 35;
const DAILY_DEPOSIT_EXCEEDED_SCORE: u32 = 30;

/// 1 小时内达到该笔数即视为频繁提现
const FREQUENT_WITHDRAWAL_COUNT: i64 = 3;
/// 金额超过 30 日均值的倍数
const UNUSUAL_AMOUNT_MULTIPLIER: i64 = 10;

/// 阈值默认值（risk_configs 未配置时使用）
pub fn default_threshold(key: &str) -> Decimal {
    match key {
        config_keys::MAX_DAILY_WITHDRAWAL => Decimal::from(50_000),
        config_keys::KYC_WITHDRAWAL_LIMIT => Decimal::from(1_000),
        config_keys::SUSPICIOUS_PATTERN_THRESHOLD => Decimal::from(10_000),
        config_keys::MAX_DAILY_DEPOSIT => Decimal::from(100_000),
        _ => Decimal::ZERO,
    }
}

/// 累加中的评分
#[derive(Debug, Default)]
struct ScoreCard {
    score: u32,
    reasons: Vec<RiskReason>,
    requires_kyc: bool,
    max_allowed_amount: Option<Decimal>,
}

impl ScoreCard {
    fn add(&mut self, weight: u32, rule: RiskRule, message: impl Into<String>) {
        self.score += weight;
        self.reasons.push(RiskReason::new(rule, message));
    }

    fn clamped_score(&self) -> u8 {
        self.score.min(100) as u8
    }

    /// 按分数区间收敛为最终决策
    fn into_withdraw_decision(mut self) -> RiskDecision {
        let score = self.clamped_score();
        let band = ScoreBand::classify(score);
        let (approved, hold_hours, requires_manual_review) = band.outcome();

        if band == ScoreBand::Review {
            self.reasons.push(RiskReason::new(
                RiskRule::ManualReviewRequired,
                "High risk score requires manual review",
            ));
        }

        RiskDecision {
            score,
            reasons: self.reasons,
            requires_kyc: self.requires_kyc,
            max_allowed_amount: self.max_allowed_amount,
            approved,
            hold_hours,
            requires_manual_review,
        }
    }
}

fn blacklisted_decision(message: &str) -> RiskDecision {
    RiskDecision {
        score: BLACKLIST_SCORE as u8,
        reasons: vec![RiskReason::new(RiskRule::BlacklistedAddress, message)],
        requires_kyc: false,
        max_allowed_amount: None,
        approved: false,
        hold_hours: 0,
        requires_manual_review: false,
    }
}

/// 风控评分引擎
pub struct RiskScoringEngine {
    withdrawals: Arc<dyn WithdrawRequestStore>,
    ledger: Arc<dyn LedgerStore>,
    compliance: Arc<dyn ComplianceStore>,
    kyc: Arc<dyn KycRegistry>,
    thresholds: Arc<CachedRiskConfig>,
    weekly_cap: Decimal,
    store_timeout: Duration,
}

impl RiskScoringEngine {
    pub fn new(
        withdrawals: Arc<dyn WithdrawRequestStore>,
        ledger: Arc<dyn LedgerStore>,
        compliance: Arc<dyn ComplianceStore>,
        kyc: Arc<dyn KycRegistry>,
        thresholds: Arc<CachedRiskConfig>,
        settings: &RiskSettings,
    ) -> Self {
        Self {
            withdrawals,
            ledger,
            compliance,
            kyc,
            thresholds,
            weekly_cap: settings.weekly_withdrawal_cap,
            store_timeout: Duration::from_millis(settings.store_timeout_ms),
        }
    }

    /// 评估一笔提现
    ///
    /// 调用方必须持有该用户的锁，否则时间窗口聚合不可信。
    pub async fn assess_withdrawal(
        &self,
        user_id: i64,
        amount: Decimal,
        to_address: &str,
        chain_id: i64,
    ) -> CoreResult<RiskDecision> {
        let now = Utc::now();

        if self.is_blacklisted(to_address, chain_id).await? {
            let decision = blacklisted_decision("Destination address is blacklisted");
            tracing::warn!(
                user_id = user_id,
                amount = %amount,
                to_address = %redact_address(to_address),
                chain_id = chain_id,
                risk_score = decision.score,
                "Withdrawal to blacklisted address rejected"
            );
            return Ok(decision);
        }

        let mut card = ScoreCard::default();
        self.check_daily_limit(user_id, amount, now, &mut card).await?;
        self.check_kyc(user_id, amount, &mut card).await?;
        self.check_suspicious_patterns(user_id, amount, now, &mut card)
            .await?;
        self.check_velocity(user_id, amount, now, &mut card).await?;

        let decision = card.into_withdraw_decision();

        tracing::info!(
            user_id = user_id,
            amount = %amount,
            to_address = %redact_address(to_address),
            risk_score = decision.score,
            approved = decision.approved,
            hold_hours = decision.hold_hours,
            reasons = ?decision.reasons.iter().map(|r| r.rule).collect::<Vec<_>>(),
            "Withdrawal risk assessment completed"
        );

        Ok(decision)
    }

    /// 评估一笔充值（来源地址黑名单 + 日充值上限）
    pub async fn assess_deposit(
        &self,
        user_id: i64,
        amount: Decimal,
        from_address: &str,
        chain_id: i64,
    ) -> CoreResult<RiskDecision> {
        if self.is_blacklisted(from_address, chain_id).await? {
            tracing::warn!(
                user_id = user_id,
                from_address = %redact_address(from_address),
                chain_id = chain_id,
                "Deposit from blacklisted address"
            );
            return Ok(blacklisted_decision("Source address is blacklisted"));
        }

        let limit = self
            .threshold(config_keys::MAX_DAILY_DEPOSIT)
            .await?;
        let since = Utc::now() - chrono::Duration::hours(24);
        let deposited = bounded(
            self.store_timeout,
            "ledger.sum_delta_since",
            self.ledger.sum_delta_since(user_id, EntryKind::Deposit, since),
        )
        .await?;

        let mut card = ScoreCard::default();
        if deposited + amount > limit {
            card.add(
                DAILY_DEPOSIT_EXCEEDED_SCORE,
                RiskRule::DailyDepositLimitExceeded,
                "Daily deposit limit exceeded",
            );
        }

        let approved = card.reasons.is_empty();
        let decision = RiskDecision {
            score: card.clamped_score(),
            reasons: card.reasons,
            requires_kyc: false,
            max_allowed_amount: None,
            approved,
            hold_hours: 0,
            requires_manual_review: false,
        };

        tracing::info!(
            user_id = user_id,
            amount = %amount,
            risk_score = decision.score,
            approved = decision.approved,
            "Deposit risk assessment completed"
        );

        Ok(decision)
    }

    async fn threshold(&self, key: &str) -> CoreResult<Decimal> {
        self.thresholds.decimal_or(key, default_threshold(key)).await
    }

    async fn is_blacklisted(&self, address: &str, chain_id: i64) -> CoreResult<bool> {
        let hit = bounded(
            self.store_timeout,
            "blacklist.find_active",
            self.compliance.find_active(address, chain_id),
        )
        .await?;
        Ok(hit.map_or(false, |entry| entry.is_active))
    }

    async fn check_daily_limit(
        &self,
        user_id: i64,
        amount: Decimal,
        now: DateTime<Utc>,
        card: &mut ScoreCard,
    ) -> CoreResult<()> {
        let limit = self.threshold(config_keys::MAX_DAILY_WITHDRAWAL).await?;
        let withdrawn = bounded(
            self.store_timeout,
            "withdraw.committed_total_since",
            self.withdrawals
                .committed_total_since(user_id, now - chrono::Duration::hours(24)),
        )
        .await?;

        let total = withdrawn + amount;
        if total > limit {
            card.max_allowed_amount = Some((limit - withdrawn).max(Decimal::ZERO));
            card.add(
                DAILY_LIMIT_EXCEEDED_SCORE,
                RiskRule::DailyLimitExceeded,
                format!(
                    "Daily withdrawal limit exceeded. Limit: {}, Already withdrawn: {}",
                    limit, withdrawn
                ),
            );
        } else if total > limit * Decimal::new(8, 1) {
            card.add(
                DAILY_LIMIT_APPROACHING_SCORE,
                RiskRule::DailyLimitApproaching,
                "Approaching daily withdrawal limit",
            );
        }

        Ok(())
    }

    async fn check_kyc(&self, user_id: i64, amount: Decimal, card: &mut ScoreCard) -> CoreResult<()> {
        let kyc_limit = self.threshold(config_keys::KYC_WITHDRAWAL_LIMIT).await?;
        if amount <= kyc_limit {
            return Ok(());
        }

        let verified = bounded(
            self.store_timeout,
            "kyc.is_verified",
            self.kyc.is_verified(user_id),
        )
        .await?;

        if !verified {
            card.requires_kyc = true;
            card.add(
                KYC_REQUIRED_SCORE,
                RiskRule::KycRequired,
                format!("KYC required for withdrawals over {}", kyc_limit),
            );
        }

        Ok(())
    }

    async fn check_suspicious_patterns(
        &self,
        user_id: i64,
        amount: Decimal,
        now: DateTime<Utc>,
        card: &mut ScoreCard,
    ) -> CoreResult<()> {
        let threshold = self
            .threshold(config_keys::SUSPICIOUS_PATTERN_THRESHOLD)
            .await?;

        let (recent_count, average) = futures::try_join!(
            bounded(
                self.store_timeout,
                "withdraw.committed_count_since",
                self.withdrawals
                    .committed_count_since(user_id, now - chrono::Duration::hours(1)),
            ),
            bounded(
                self.store_timeout,
                "withdraw.committed_average_since",
                self.withdrawals
                    .committed_average_since(user_id, now - chrono::Duration::days(30)),
            ),
        )?;

        if recent_count >= FREQUENT_WITHDRAWAL_COUNT {
            card.add(
                FREQUENT_WITHDRAWALS_SCORE,
                RiskRule::FrequentWithdrawals,
                "Multiple withdrawals in short time period",
            );
        }

        // 无历史记录时均值为 0，不触发
        if amount > threshold
            && average > Decimal::ZERO
            && amount > average * Decimal::from(UNUSUAL_AMOUNT_MULTIPLIER)
        {
            card.add(
                UNUSUAL_AMOUNT_SCORE,
                RiskRule::UnusualAmount,
                "Withdrawal amount significantly higher than usual",
            );
        }

        Ok(())
    }

    async fn check_velocity(
        &self,
        user_id: i64,
        amount: Decimal,
        now: DateTime<Utc>,
        card: &mut ScoreCard,
    ) -> CoreResult<()> {
        let weekly = bounded(
            self.store_timeout,
            "withdraw.committed_total_since",
            self.withdrawals
                .committed_total_since(user_id, now - chrono::Duration::days(7)),
        )
        .await?;

        if weekly + amount > self.weekly_cap {
            card.add(
                WEEKLY_VELOCITY_SCORE,
                RiskRule::WeeklyVelocityExceeded,
                "Weekly withdrawal limit approached",
            );
        }

        Ok(())
    }
}
