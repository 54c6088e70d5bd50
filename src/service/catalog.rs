//! 链与资产解析：未知或已停用一律视为 NotFound

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{Asset, Chain},
    error::{CoreError, CoreResult},
    infrastructure::timeout::bounded,
    repository::ChainAssetResolver,
};

pub struct ChainCatalog {
    resolver: Arc<dyn ChainAssetResolver>,
    store_timeout: Duration,
}

impl ChainCatalog {
    pub fn new(resolver: Arc<dyn ChainAssetResolver>, store_timeout: Duration) -> Self {
        Self {
            resolver,
            store_timeout,
        }
    }

    pub async fn resolve(&self, chain_key: &str, asset_symbol: &str) -> CoreResult<(Chain, Asset)> {
        let chain = bounded(
            self.store_timeout,
            "chain.find",
            self.resolver.find_chain(chain_key),
        )
        .await?
        .filter(|c| c.enabled)
        .ok_or_else(|| CoreError::NotFound(format!("chain {}", chain_key)))?;

        let asset = bounded(
            self.store_timeout,
            "asset.find",
            self.resolver.find_asset(asset_symbol),
        )
        .await?
        .filter(|a| a.enabled)
        .ok_or_else(|| CoreError::NotFound(format!("asset {}", asset_symbol)))?;

        Ok((chain, asset))
    }
}
