//! 链 / 资产元数据 Repository
//! 只返回 enabled 的记录，禁用与不存在对调用方一致表现为 None

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::domain::{Asset, Chain};

/// Repository Trait
#[async_trait]
pub trait ChainAssetResolver: Send + Sync {
    async fn find_chain(&self, chain_key: &str) -> Result<Option<Chain>>;

    async fn find_asset(&self, symbol: &str) -> Result<Option<Asset>>;
}

#[derive(Debug, FromRow)]
struct ChainRow {
    id: i64,
    chain_key: String,
    network_id: i64,
    name: String,
    enabled: bool,
}

#[derive(Debug, FromRow)]
struct AssetRow {
    id: i64,
    symbol: String,
    name: String,
    decimals: i32,
    min_deposit: Decimal,
    enabled: bool,
}

/// PostgreSQL 实现
pub struct PgChainAssetRepository {
    pool: PgPool,
}

impl PgChainAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChainAssetResolver for PgChainAssetRepository {
    async fn find_chain(&self, chain_key: &str) -> Result<Option<Chain>> {
        let row = sqlx::query_as::<_, ChainRow>(
            r#"
            SELECT id, chain_key, network_id, name, enabled
            FROM chains
            WHERE chain_key = $1 AND enabled = TRUE
            "#,
        )
        .bind(chain_key.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query chain")?;

        Ok(row.map(|r| Chain {
            id: r.id,
            chain_key: r.chain_key,
            network_id: r.network_id,
            name: r.name,
            enabled: r.enabled,
        }))
    }

    async fn find_asset(&self, symbol: &str) -> Result<Option<Asset>> {
        let row = sqlx::query_as::<_, AssetRow>(
            r#"
            SELECT id, symbol, name, decimals, min_deposit, enabled
            FROM assets
            WHERE symbol = $1 AND enabled = TRUE
            "#,
        )
        .bind(symbol.to_uppercase())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query asset")?;

        Ok(row.map(|r| Asset {
            id: r.id,
            symbol: r.symbol,
            name: r.name,
            decimals: r.decimals,
            min_deposit: r.min_deposit,
            enabled: r.enabled,
        }))
    }
}
