//! 风控配置 Repository（只读，运营后台负责修改）

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

/// Repository Trait
#[async_trait]
pub trait RiskConfigStore: Send + Sync {
    /// 按键读取原始配置值，不存在返回 None
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// PostgreSQL 实现
pub struct PgRiskConfigRepository {
    pool: PgPool,
}

impl PgRiskConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RiskConfigStore for PgRiskConfigRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT config_value FROM risk_configs WHERE config_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to read risk config {}", key))?;

        Ok(value)
    }
}
