//! 合规黑名单 Repository（只读）

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::domain::BlacklistAddress;

/// Repository Trait
#[async_trait]
pub trait ComplianceStore: Send + Sync {
    /// 查找对该链生效的黑名单记录（链级或全链级），仅返回 is_active 的记录
    async fn find_active(&self, address: &str, chain_id: i64) -> Result<Option<BlacklistAddress>>;
}

#[derive(Debug, FromRow)]
struct BlacklistRow {
    address: String,
    chain_id: Option<i64>,
    reason: Option<String>,
    source: Option<String>,
    is_active: bool,
}

impl From<BlacklistRow> for BlacklistAddress {
    fn from(row: BlacklistRow) -> Self {
        Self {
            address: row.address,
            chain_id: row.chain_id,
            reason: row.reason,
            source: row.source,
            is_active: row.is_active,
        }
    }
}

/// PostgreSQL 实现
pub struct PgBlacklistRepository {
    pool: PgPool,
}

impl PgBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ComplianceStore for PgBlacklistRepository {
    async fn find_active(&self, address: &str, chain_id: i64) -> Result<Option<BlacklistAddress>> {
        // ✅ 使用 LOWER() 进行不区分大小写的地址匹配（EVM 地址）
        let row = sqlx::query_as::<_, BlacklistRow>(
            r#"
            SELECT address, chain_id, reason, source, is_active
            FROM blacklist_addresses
            WHERE LOWER(address) = LOWER($1)
              AND (chain_id = $2 OR chain_id IS NULL)
              AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(address)
        .bind(chain_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query blacklist")?;

        Ok(row.map(BlacklistAddress::from))
    }
}
