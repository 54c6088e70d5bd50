//! kusdcore - KUSD 提现准入与账本一致性引擎
//!
//! 账本只追加：余额 = 用户所有账本记录 kusd_delta 之和。
//! 提现在每用户锁内完成风控评分与落库，结算完成时才写入扣款记录。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod repository;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode, CoreError};

pub mod prelude {
    pub use crate::{
        app_state::{AppState, Stores},
        domain::{EntryKind, RiskDecision, WithdrawStatus},
        error::{AppError, AppErrorCode, CoreError, CoreResult},
    };
}
