//! 充值地址分配
//!
//! 地址由离线密钥服务预生成写入 `deposit_address_pool`，本服务只负责认领，
//! 后端不接触私钥。同一 (user, chain, asset) 最多一个活跃地址，由部分唯一索引保证。

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::domain::{AllocatedAddress, Asset, Chain};

/// 地址分配器
#[async_trait]
pub trait AddressAllocator: Send + Sync {
    async fn get_or_create(
        &self,
        user_id: i64,
        chain: &Chain,
        asset: &Asset,
    ) -> Result<AllocatedAddress>;
}

#[derive(Debug, FromRow)]
struct AddressRow {
    address: String,
    derivation_path: Option<String>,
}

/// PostgreSQL 实现（地址池认领）
pub struct PgAddressAllocator {
    pool: PgPool,
}

impl PgAddressAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_active(
        &self,
        user_id: i64,
        chain_id: i64,
        asset_id: i64,
    ) -> Result<Option<AddressRow>> {
        let row = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT address, derivation_path
            FROM deposit_addresses
            WHERE user_id = $1 AND chain_id = $2 AND asset_id = $3 AND is_active = TRUE
            "#,
        )
        .bind(user_id)
        .bind(chain_id)
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query deposit address")?;

        Ok(row)
    }
}

#[async_trait]
impl AddressAllocator for PgAddressAllocator {
    async fn get_or_create(
        &self,
        user_id: i64,
        chain: &Chain,
        asset: &Asset,
    ) -> Result<AllocatedAddress> {
        if let Some(existing) = self.find_active(user_id, chain.id, asset.id).await? {
            return Ok(AllocatedAddress {
                address: existing.address,
                derivation_path: existing.derivation_path.unwrap_or_default(),
                freshly_created: false,
            });
        }

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // SKIP LOCKED：并发分配不会认领同一个池地址
        let claimed = sqlx::query_as::<_, AddressRow>(
            r#"
            UPDATE deposit_address_pool
            SET assigned_user_id = $1, assigned_at = CURRENT_TIMESTAMP
            WHERE id = (
                SELECT id FROM deposit_address_pool
                WHERE chain_id = $2 AND assigned_user_id IS NULL
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING address, derivation_path
            "#,
        )
        .bind(user_id)
        .bind(chain.id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to claim pooled address")?
        .ok_or_else(|| anyhow::anyhow!("deposit address pool exhausted for {}", chain.chain_key))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO deposit_addresses
                (user_id, chain_id, asset_id, address, derivation_path, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(chain.id)
        .bind(asset.id)
        .bind(&claimed.address)
        .bind(&claimed.derivation_path)
        .execute(&mut *tx)
        .await
        .context("Failed to insert deposit address")?;

        if inserted.rows_affected() == 0 {
            // 并发请求已为该用户分配，放弃本次认领
            tx.rollback().await.ok();
            let existing = self
                .find_active(user_id, chain.id, asset.id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("deposit address conflict without active row"))?;
            return Ok(AllocatedAddress {
                address: existing.address,
                derivation_path: existing.derivation_path.unwrap_or_default(),
                freshly_created: false,
            });
        }

        tx.commit().await.context("Failed to commit address claim")?;

        tracing::info!(
            user_id = user_id,
            chain = %chain.chain_key,
            asset = %asset.symbol,
            "Allocated deposit address"
        );

        Ok(AllocatedAddress {
            address: claimed.address,
            derivation_path: claimed.derivation_path.unwrap_or_default(),
            freshly_created: true,
        })
    }
}
