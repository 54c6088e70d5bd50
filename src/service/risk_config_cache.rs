//! 风控阈值缓存
//!
//! 阈值读多写少，按 TTL 缓存；过期后下一次读取回源。缺失的键也会被缓存，
//! 避免未配置的阈值每次都打到存储。

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{
    error::{CoreError, CoreResult},
    infrastructure::timeout::bounded,
    repository::RiskConfigStore,
};

struct ConfigCacheItem {
    value: Option<String>,
    updated_at: Instant,
}

pub struct CachedRiskConfig {
    store: Arc<dyn RiskConfigStore>,
    cache: RwLock<HashMap<String, ConfigCacheItem>>,
    ttl: Duration,
    store_timeout: Duration,
}

impl CachedRiskConfig {
    pub fn new(store: Arc<dyn RiskConfigStore>, ttl: Duration, store_timeout: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            ttl,
            store_timeout,
        }
    }

    /// 读取原始值（经缓存）
    pub async fn raw(&self, key: &str) -> CoreResult<Option<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(item) = cache.get(key) {
                if item.updated_at.elapsed() < self.ttl {
                    return Ok(item.value.clone());
                }
            }
        }

        let value = bounded(self.store_timeout, "risk_config.get", self.store.get(key)).await?;

        self.cache.write().await.insert(
            key.to_string(),
            ConfigCacheItem {
                value: value.clone(),
                updated_at: Instant::now(),
            },
        );

        Ok(value)
    }

    /// 读取十进制阈值；键不存在时使用默认值，值无法解析时视为存储故障
    pub async fn decimal_or(&self, key: &str, default: Decimal) -> CoreResult<Decimal> {
        match self.raw(key).await? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<Decimal>().map_err(|e| {
                tracing::error!(key = key, value = %raw, "Unparsable risk config value");
                CoreError::Store(anyhow::anyhow!("risk config {} is not a decimal: {}", key, e))
            }),
        }
    }

    /// 清空缓存（运营修改阈值后可立即生效）
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}
