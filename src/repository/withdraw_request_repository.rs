//! 提现申请 Repository
//!
//! 时间窗口聚合只统计已占用额度的状态（pending / pending_review / processing / completed）。

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::domain::{NewWithdrawRequest, StatusUpdate, WithdrawRequest, WithdrawStatus};

/// Repository Trait
#[async_trait]
pub trait WithdrawRequestStore: Send + Sync {
    async fn create(&self, request: NewWithdrawRequest) -> Result<WithdrawRequest>;

    async fn find_by_id(&self, id: i64) -> Result<Option<WithdrawRequest>>;

    async fn list_by_user(&self, user_id: i64, offset: i64, limit: i64)
        -> Result<Vec<WithdrawRequest>>;

    /// since 之后已占用额度的提现总额
    async fn committed_total_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<Decimal>;

    /// since 之后已占用额度的提现笔数
    async fn committed_count_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64>;

    /// since 之后已占用额度的提现平均金额，无记录时为 0
    async fn committed_average_since(&self, user_id: i64, since: DateTime<Utc>)
        -> Result<Decimal>;

    /// 比较并交换：仅当当前状态为 `from` 时更新为 `to`，否则返回 None
    async fn transition(
        &self,
        id: i64,
        from: WithdrawStatus,
        to: WithdrawStatus,
        update: StatusUpdate,
    ) -> Result<Option<WithdrawRequest>>;
}

#[derive(Debug, FromRow)]
struct WithdrawRow {
    id: i64,
    user_id: i64,
    chain_id: i64,
    asset_id: i64,
    amount: Decimal,
    to_address: String,
    fee: Decimal,
    risk_score: i16,
    status: String,
    admin_notes: Option<String>,
    tx_hash: Option<String>,
    ledger_entry_id: Option<i64>,
    settle_after: DateTime<Utc>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WithdrawRow> for WithdrawRequest {
    type Error = anyhow::Error;

    fn try_from(row: WithdrawRow) -> Result<Self> {
        Ok(WithdrawRequest {
            id: row.id,
            user_id: row.user_id,
            chain_id: row.chain_id,
            asset_id: row.asset_id,
            amount: row.amount,
            to_address: row.to_address,
            fee: row.fee,
            risk_score: u8::try_from(row.risk_score.clamp(0, 100)).unwrap_or(100),
            status: WithdrawStatus::parse(&row.status)
                .map_err(|e| anyhow::anyhow!("corrupt withdraw row {}: {}", row.id, e))?,
            admin_notes: row.admin_notes,
            tx_hash: row.tx_hash,
            ledger_entry_id: row.ledger_entry_id,
            settle_after: row.settle_after,
            created_at: row.created_at,
            processed_at: row.processed_at,
        })
    }
}

const WITHDRAW_COLUMNS: &str = "id, user_id, chain_id, asset_id, amount, to_address, fee, \
                                risk_score, status, admin_notes, tx_hash, ledger_entry_id, \
                                settle_after, created_at, processed_at";

fn committed_statuses() -> Vec<String> {
    WithdrawStatus::COMMITTED
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// PostgreSQL 实现
pub struct PgWithdrawRequestRepository {
    pool: PgPool,
}

impl PgWithdrawRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WithdrawRequestStore for PgWithdrawRequestRepository {
    async fn create(&self, request: NewWithdrawRequest) -> Result<WithdrawRequest> {
        let sql = format!(
            r#"
            INSERT INTO withdraw_requests
                (user_id, chain_id, asset_id, amount, to_address, fee, risk_score, status, settle_after)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            WITHDRAW_COLUMNS
        );
        let row = sqlx::query_as::<_, WithdrawRow>(&sql)
            .bind(request.user_id)
            .bind(request.chain_id)
            .bind(request.asset_id)
            .bind(request.amount)
            .bind(&request.to_address)
            .bind(request.fee)
            .bind(i16::from(request.risk_score))
            .bind(request.status.as_str())
            .bind(request.settle_after)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create withdraw request")?;

        row.try_into()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<WithdrawRequest>> {
        let sql = format!("SELECT {} FROM withdraw_requests WHERE id = $1", WITHDRAW_COLUMNS);
        let row = sqlx::query_as::<_, WithdrawRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query withdraw request")?;

        row.map(WithdrawRequest::try_from).transpose()
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WithdrawRequest>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM withdraw_requests
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            WITHDRAW_COLUMNS
        );
        let rows = sqlx::query_as::<_, WithdrawRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list withdraw requests")?;

        rows.into_iter().map(WithdrawRequest::try_from).collect()
    }

    async fn committed_total_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM withdraw_requests
            WHERE user_id = $1 AND status = ANY($2) AND created_at > $3
            "#,
        )
        .bind(user_id)
        .bind(committed_statuses())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum withdrawals in window")?;

        Ok(total)
    }

    async fn committed_count_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM withdraw_requests
            WHERE user_id = $1 AND status = ANY($2) AND created_at > $3
            "#,
        )
        .bind(user_id)
        .bind(committed_statuses())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count withdrawals in window")?;

        Ok(count)
    }

    async fn committed_average_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Decimal> {
        let avg: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT AVG(amount)
            FROM withdraw_requests
            WHERE user_id = $1 AND status = ANY($2) AND created_at > $3
            "#,
        )
        .bind(user_id)
        .bind(committed_statuses())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to average withdrawals in window")?;

        Ok(avg.unwrap_or(Decimal::ZERO))
    }

    async fn transition(
        &self,
        id: i64,
        from: WithdrawStatus,
        to: WithdrawStatus,
        update: StatusUpdate,
    ) -> Result<Option<WithdrawRequest>> {
        let sql = format!(
            r#"
            UPDATE withdraw_requests
            SET status = $3,
                admin_notes = COALESCE($4, admin_notes),
                tx_hash = COALESCE($5, tx_hash),
                ledger_entry_id = COALESCE($6, ledger_entry_id),
                processed_at = CASE WHEN $7 THEN CURRENT_TIMESTAMP ELSE processed_at END
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            WITHDRAW_COLUMNS
        );
        let row = sqlx::query_as::<_, WithdrawRow>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(update.admin_notes)
            .bind(update.tx_hash)
            .bind(update.ledger_entry_id)
            .bind(to.is_terminal())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to transition withdraw request")?;

        row.map(WithdrawRequest::try_from).transpose()
    }
}
