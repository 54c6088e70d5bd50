//! 存储层：trait 抽象 + PostgreSQL 实现，另有内存实现用于测试

pub mod blacklist_repository;
pub mod chain_repository;
pub mod deposit_address_repository;
pub mod kyc_repository;
pub mod ledger_repository;
pub mod memory;
pub mod risk_config_repository;
pub mod withdraw_request_repository;

pub use blacklist_repository::{ComplianceStore, PgBlacklistRepository};
pub use chain_repository::{ChainAssetResolver, PgChainAssetRepository};
pub use deposit_address_repository::{AddressAllocator, PgAddressAllocator};
pub use kyc_repository::{KycRegistry, PgKycRepository};
pub use ledger_repository::{LedgerStore, PgLedgerRepository};
pub use memory::InMemoryStore;
pub use risk_config_repository::{PgRiskConfigRepository, RiskConfigStore};
pub use withdraw_request_repository::{PgWithdrawRequestRepository, WithdrawRequestStore};
