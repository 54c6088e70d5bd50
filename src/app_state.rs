use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    infrastructure::{db::PgPool, user_lock::UserLocks},
    repository::{
        AddressAllocator, ChainAssetResolver, ComplianceStore, InMemoryStore, KycRegistry,
        LedgerStore, PgAddressAllocator, PgBlacklistRepository, PgChainAssetRepository,
        PgKycRepository, PgLedgerRepository, PgRiskConfigRepository,
        PgWithdrawRequestRepository, RiskConfigStore, WithdrawRequestStore,
    },
    service::{
        CachedRiskConfig, ChainCatalog, DepositAddressService, LedgerService, RecordsService,
        RiskScoringEngine, SettlementService, WithdrawalAdmissionController,
    },
};

/// 存储依赖集合
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn LedgerStore>,
    pub withdrawals: Arc<dyn WithdrawRequestStore>,
    pub compliance: Arc<dyn ComplianceStore>,
    pub risk_config: Arc<dyn RiskConfigStore>,
    pub kyc: Arc<dyn KycRegistry>,
    pub catalog: Arc<dyn ChainAssetResolver>,
    pub addresses: Arc<dyn AddressAllocator>,
}

impl Stores {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            ledger: Arc::new(PgLedgerRepository::new(pool.clone())),
            withdrawals: Arc::new(PgWithdrawRequestRepository::new(pool.clone())),
            compliance: Arc::new(PgBlacklistRepository::new(pool.clone())),
            risk_config: Arc::new(PgRiskConfigRepository::new(pool.clone())),
            kyc: Arc::new(PgKycRepository::new(pool.clone())),
            catalog: Arc::new(PgChainAssetRepository::new(pool.clone())),
            addresses: Arc::new(PgAddressAllocator::new(pool.clone())),
        }
    }

    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            ledger: store.clone(),
            withdrawals: store.clone(),
            compliance: store.clone(),
            risk_config: store.clone(),
            kyc: store.clone(),
            catalog: store.clone(),
            addresses: store,
        }
    }
}

/// 应用状态
/// 各服务在此一次性组装，配置按值注入，不读取全局状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 内存模式下为空
    pub pool: Option<PgPool>,
    pub risk_config: Arc<CachedRiskConfig>,
    pub engine: Arc<RiskScoringEngine>,
    pub admission: Arc<WithdrawalAdmissionController>,
    pub deposit_addresses: Arc<DepositAddressService>,
    pub ledger: Arc<LedgerService>,
    pub records: Arc<RecordsService>,
    pub settlement: Arc<SettlementService>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        stores: Stores,
        locks: UserLocks,
        pool: Option<PgPool>,
    ) -> Self {
        let store_timeout = Duration::from_millis(config.risk.store_timeout_ms);

        let risk_config = Arc::new(CachedRiskConfig::new(
            stores.risk_config.clone(),
            Duration::from_secs(config.risk.config_cache_ttl_secs),
            store_timeout,
        ));
        let engine = Arc::new(RiskScoringEngine::new(
            stores.withdrawals.clone(),
            stores.ledger.clone(),
            stores.compliance.clone(),
            stores.kyc.clone(),
            risk_config.clone(),
            &config.risk,
        ));
        let catalog = Arc::new(ChainCatalog::new(stores.catalog.clone(), store_timeout));

        let admission = Arc::new(WithdrawalAdmissionController::new(
            catalog.clone(),
            engine.clone(),
            stores.withdrawals.clone(),
            Arc::new(locks),
            &config.withdrawal,
            store_timeout,
        ));
        let deposit_addresses = Arc::new(DepositAddressService::new(
            catalog,
            stores.addresses.clone(),
            store_timeout,
        ));
        let ledger = Arc::new(LedgerService::new(stores.ledger.clone(), store_timeout));
        let records = Arc::new(RecordsService::new(
            stores.ledger.clone(),
            stores.withdrawals.clone(),
            config.withdrawal.max_page_size,
            store_timeout,
        ));
        let settlement = Arc::new(SettlementService::new(
            stores.withdrawals.clone(),
            ledger.clone(),
            store_timeout,
        ));

        Self {
            config,
            pool,
            risk_config,
            engine,
            admission,
            deposit_addresses,
            ledger,
            records,
            settlement,
        }
    }
}
