//! 链与资产元数据

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 支持的区块链
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: i64,
    /// ethereum, arbitrum ...
    pub chain_key: String,
    /// EVM chain id（1, 42161 ...）
    pub network_id: i64,
    pub name: String,
    pub enabled: bool,
}

/// 支持的资产
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub decimals: i32,
    pub min_deposit: Decimal,
    pub enabled: bool,
}

/// 地址分配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedAddress {
    pub address: String,
    /// 不透明的派生路径标识
    pub derivation_path: String,
    pub freshly_created: bool,
}
