//! 充值地址查询：同一 (用户, 链, 资产) 始终返回同一个活跃地址

use std::{sync::Arc, time::Duration};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::CoreResult,
    infrastructure::{log_redact::redact_address, timeout::bounded},
    repository::AddressAllocator,
    service::catalog::ChainCatalog,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAddress {
    pub chain: String,
    pub asset: String,
    pub address: String,
    pub min_amount: Decimal,
    pub fresh: bool,
}

pub struct DepositAddressService {
    catalog: Arc<ChainCatalog>,
    allocator: Arc<dyn AddressAllocator>,
    store_timeout: Duration,
}

impl DepositAddressService {
    pub fn new(
        catalog: Arc<ChainCatalog>,
        allocator: Arc<dyn AddressAllocator>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            allocator,
            store_timeout,
        }
    }

    pub async fn get_or_create(
        &self,
        user_id: i64,
        chain_key: &str,
        asset_symbol: &str,
    ) -> CoreResult<DepositAddress> {
        let (chain, asset) = self.catalog.resolve(chain_key, asset_symbol).await?;

        let allocated = bounded(
            self.store_timeout,
            "address.get_or_create",
            self.allocator.get_or_create(user_id, &chain, &asset),
        )
        .await?;

        if allocated.freshly_created {
            tracing::info!(
                user_id = user_id,
                chain = %chain.chain_key,
                asset = %asset.symbol,
                address = %redact_address(&allocated.address),
                "Issued new deposit address"
            );
        }

        Ok(DepositAddress {
            chain: chain.chain_key,
            asset: asset.symbol,
            address: allocated.address,
            min_amount: asset.min_deposit,
            fresh: allocated.freshly_created,
        })
    }
}
