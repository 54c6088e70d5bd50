//! 测试辅助模块
//! 基于 InMemoryStore 组装完整的 AppState，不依赖外部数据库

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use kusdcore::{
    app_state::{AppState, Stores},
    config::Config,
    domain::{Asset, BlacklistAddress, Chain, NewWithdrawRequest, WithdrawStatus},
    infrastructure::user_lock::UserLocks,
    repository::InMemoryStore,
};
use rust_decimal::Decimal;

pub const CHAIN: &str = "ethereum";
pub const ASSET: &str = "USDT";
pub const DEST: &str = "0x1111111111111111111111111111111111111111";

/// 已上架 ethereum / USDT 的内存存储
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.insert_chain(Chain {
        id: 1,
        chain_key: CHAIN.into(),
        network_id: 1,
        name: "Ethereum".into(),
        enabled: true,
    });
    store.insert_asset(Asset {
        id: 1,
        symbol: ASSET.into(),
        name: "Tether USD".into(),
        decimals: 6,
        min_deposit: Decimal::from(10),
        enabled: true,
    });
    store
}

pub fn test_config() -> Config {
    let mut config = Config::from_env().expect("default config");
    config.risk.store_timeout_ms = 200;
    config.risk.config_cache_ttl_secs = 30;
    config.risk.weekly_withdrawal_cap = Decimal::from(100_000);
    config.withdrawal.fee_rate = Decimal::new(1, 3);
    config.withdrawal.max_page_size = 100;
    config
}

/// 创建测试应用状态
pub fn create_test_app_state(store: Arc<InMemoryStore>) -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(test_config()),
        Stores::in_memory(store),
        UserLocks::local(Duration::from_secs(2)),
        None,
    ))
}

/// 写入一条历史提现
pub fn past_withdrawal(
    store: &InMemoryStore,
    user_id: i64,
    amount: Decimal,
    ago: chrono::Duration,
    status: WithdrawStatus,
) {
    let created_at = Utc::now() - ago;
    store.insert_withdrawal_at(
        NewWithdrawRequest {
            user_id,
            chain_id: 1,
            asset_id: 1,
            amount,
            to_address: DEST.into(),
            fee: Decimal::ZERO,
            risk_score: 0,
            status,
            settle_after: created_at,
        },
        created_at,
    );
}

pub fn blacklist(store: &InMemoryStore, address: &str) {
    store.add_blacklist(BlacklistAddress {
        address: address.into(),
        chain_id: None,
        reason: Some("sanctioned".into()),
        source: Some("ofac".into()),
        is_active: true,
    });
}
