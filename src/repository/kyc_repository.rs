use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

/// KYC 状态查询
#[async_trait]
pub trait KycRegistry: Send + Sync {
    /// 无记录视为未完成 KYC
    async fn is_verified(&self, user_id: i64) -> Result<bool>;
}

/// PostgreSQL 实现
pub struct PgKycRepository {
    pool: PgPool,
}

impl PgKycRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KycRegistry for PgKycRepository {
    async fn is_verified(&self, user_id: i64) -> Result<bool> {
        let verified: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_kyc
                WHERE user_id = $1 AND status = 'verified'
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to query KYC status")?;

        Ok(verified)
    }
}
