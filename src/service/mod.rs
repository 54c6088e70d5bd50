pub mod catalog;
pub mod deposit_address_service;
pub mod ledger_service;
pub mod records_service;
pub mod risk_config_cache;
pub mod settlement_service;
pub mod withdrawal_admission;
pub mod withdrawal_risk_control;

pub use catalog::ChainCatalog;
pub use deposit_address_service::{DepositAddress, DepositAddressService};
pub use ledger_service::{LedgerService, Recorded};
pub use records_service::{RecordsPage, RecordsService, WithdrawalsPage};
pub use risk_config_cache::CachedRiskConfig;
pub use settlement_service::SettlementService;
pub use withdrawal_admission::{WithdrawOutcome, WithdrawalAdmissionController};
pub use withdrawal_risk_control::RiskScoringEngine;
