use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// 核心领域错误
///
/// 业务拒绝（黑名单、超限、需要KYC）不是错误，而是 `approved=false` 的正常决策。
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// 外部事件已入账（ref_tx_hash 重复）
    #[error("ledger reference {ref_tx_hash} already recorded as entry {existing_id}")]
    DuplicateReference { ref_tx_hash: String, existing_id: i64 },

    #[error("invalid withdraw state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("store call timed out: {operation}")]
    Timeout { operation: &'static str },

    #[error("per-user lock unavailable: {0}")]
    LockUnavailable(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl CoreError {
    /// 内部故障：存储不可用、超时、锁获取失败。调用方可整体幂等重试。
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CoreError::Timeout { .. } | CoreError::LockUnavailable(_) | CoreError::Store(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone)]
pub enum AppErrorCode {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    Internal,

    // 业务错误码
    InvalidAmount,
    InvalidAddress,
    InvalidParameter,
    DuplicateReference,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    trace_id: Option<&'a str>,
}

impl AppErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::Unauthorized => "unauthorized",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Conflict => "conflict",
            AppErrorCode::Internal => "internal",
            AppErrorCode::InvalidAmount => "invalid_amount",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::InvalidParameter => "invalid_parameter",
            AppErrorCode::DuplicateReference => "duplicate_reference",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Unauthorized, StatusCode::UNAUTHORIZED, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Conflict, StatusCode::CONFLICT, msg)
    }

    /// 内部错误对外只返回通用提示，不暴露存储层细节
    pub fn internal() -> Self {
        Self::new(
            AppErrorCode::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Service temporarily unavailable, please retry later",
        )
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAmount, StatusCode::BAD_REQUEST, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidAddress, StatusCode::BAD_REQUEST, msg)
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::InvalidParameter, StatusCode::BAD_REQUEST, msg)
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(what) => Self::not_found(format!("{} not found", what)),
            CoreError::InvalidAmount(msg) => Self::invalid_amount(msg),
            CoreError::InvalidAddress(msg) => Self::invalid_address(msg),
            CoreError::InvalidParameter(msg) => Self::invalid_parameter(msg),
            CoreError::DuplicateReference { .. } => Self::new(
                AppErrorCode::DuplicateReference,
                StatusCode::CONFLICT,
                "Reference already recorded",
            ),
            CoreError::InvalidTransition { from, to } => {
                Self::conflict(format!("Cannot move withdrawal from {} to {}", from, to))
            }
            ref internal @ (CoreError::Timeout { .. }
            | CoreError::LockUnavailable(_)
            | CoreError::Store(_)) => {
                tracing::error!(error = %internal, "Internal failure");
                Self::internal()
            }
        }
    }
}
