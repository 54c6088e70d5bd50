//! 账本 Repository
//!
//! 只追加。ref_tx_hash 存在时由唯一约束保证同一链上事件只入账一次。

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::{
    domain::{EntryKind, LedgerEntry, NewLedgerEntry},
    error::{CoreError, CoreResult},
};

/// Repository Trait
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 追加记录；ref_tx_hash 已存在时返回 `CoreError::DuplicateReference`
    async fn append(&self, entry: NewLedgerEntry) -> CoreResult<LedgerEntry>;

    /// 用户当前 KUSD 余额（精确十进制求和）
    async fn balance_of(&self, user_id: i64) -> Result<Decimal>;

    async fn find_by_ref(&self, ref_tx_hash: &str) -> Result<Option<LedgerEntry>>;

    /// 按创建时间倒序分页
    async fn list_by_user(
        &self,
        user_id: i64,
        kind: Option<EntryKind>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>>;

    /// 时间窗口内某类记录的 kusd_delta 之和
    async fn sum_delta_since(
        &self,
        user_id: i64,
        kind: EntryKind,
        since: DateTime<Utc>,
    ) -> Result<Decimal>;
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    id: i64,
    user_id: i64,
    entry_type: String,
    chain_id: Option<i64>,
    asset_id: Option<i64>,
    amount: Decimal,
    kusd_delta: Decimal,
    ref_tx_hash: Option<String>,
    batch_id: Option<i64>,
    proof_root: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = anyhow::Error;

    fn try_from(row: LedgerRow) -> Result<Self> {
        Ok(LedgerEntry {
            id: row.id,
            user_id: row.user_id,
            kind: EntryKind::parse(&row.entry_type)
                .map_err(|e| anyhow::anyhow!("corrupt ledger row {}: {}", row.id, e))?,
            chain_id: row.chain_id,
            asset_id: row.asset_id,
            amount: row.amount,
            kusd_delta: row.kusd_delta,
            ref_tx_hash: row.ref_tx_hash,
            batch_id: row.batch_id,
            proof_root: row.proof_root,
            created_at: row.created_at,
        })
    }
}

const LEDGER_COLUMNS: &str = "id, user_id, entry_type, chain_id, asset_id, amount, kusd_delta, \
                              ref_tx_hash, batch_id, proof_root, created_at";

/// PostgreSQL 实现
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerRepository {
    async fn append(&self, entry: NewLedgerEntry) -> CoreResult<LedgerEntry> {
        let sql = format!(
            r#"
            INSERT INTO ledger_entries
                (user_id, entry_type, chain_id, asset_id, amount, kusd_delta,
                 ref_tx_hash, batch_id, proof_root)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (ref_tx_hash) DO NOTHING
            RETURNING {}
            "#,
            LEDGER_COLUMNS
        );

        let inserted = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(entry.user_id)
            .bind(entry.kind.as_str())
            .bind(entry.chain_id)
            .bind(entry.asset_id)
            .bind(entry.amount)
            .bind(entry.kusd_delta)
            .bind(&entry.ref_tx_hash)
            .bind(entry.batch_id)
            .bind(&entry.proof_root)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to insert ledger entry")?;

        match inserted {
            Some(row) => Ok(row.try_into()?),
            None => {
                // 只有 ref_tx_hash 冲突会走到这里（NULL 不参与唯一约束）
                let ref_tx_hash = entry.ref_tx_hash.unwrap_or_default();
                let existing = self
                    .find_by_ref(&ref_tx_hash)
                    .await?
                    .ok_or_else(|| {
                        anyhow::anyhow!("ledger conflict on {} but no row found", ref_tx_hash)
                    })?;
                Err(CoreError::DuplicateReference {
                    ref_tx_hash,
                    existing_id: existing.id,
                })
            }
        }
    }

    async fn balance_of(&self, user_id: i64) -> Result<Decimal> {
        let balance: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(kusd_delta), 0) FROM ledger_entries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum ledger balance")?;

        Ok(balance)
    }

    async fn find_by_ref(&self, ref_tx_hash: &str) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM ledger_entries WHERE ref_tx_hash = $1",
            LEDGER_COLUMNS
        );
        let row = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(ref_tx_hash)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query ledger entry by reference")?;

        row.map(LedgerEntry::try_from).transpose()
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        kind: Option<EntryKind>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM ledger_entries
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR entry_type = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            LEDGER_COLUMNS
        );
        let rows = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(user_id)
            .bind(kind.map(|k| k.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list ledger entries")?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn sum_delta_since(
        &self,
        user_id: i64,
        kind: EntryKind,
        since: DateTime<Utc>,
    ) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(kusd_delta), 0)
            FROM ledger_entries
            WHERE user_id = $1 AND entry_type = $2 AND created_at > $3
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum ledger window")?;

        Ok(total)
    }
}
