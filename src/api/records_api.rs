//! 只读查询 API：余额、账本记录、提现列表与详情

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        middleware::AuthUser,
        response::{success_response, ApiResult},
    },
    app_state::AppState,
    domain::{EntryKind, WithdrawRequest},
    error::{AppError, CoreError},
    service::{RecordsPage, WithdrawalsPage},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub user_id: i64,
    pub balance_kusd: Decimal,
}

/// GET /api/v1/portfolio/balance
pub async fn balance(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<BalanceView> {
    let balance_kusd = state.ledger.balance(user_id).await?;
    success_response(BalanceView {
        user_id,
        balance_kusd,
    })
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/records?type=deposit&cursor=..&limit=20
pub async fn records(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<RecordsQuery>,
) -> ApiResult<RecordsPage> {
    let kind = match query.kind.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(EntryKind::parse(raw)?),
    };

    let page = state
        .records
        .list(user_id, kind, query.cursor.as_deref(), query.limit)
        .await?;
    success_response(page)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/withdrawals?cursor=..&limit=20
pub async fn withdrawals(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<WithdrawalsPage> {
    let page = state
        .records
        .list_withdrawals(user_id, query.cursor.as_deref(), query.limit)
        .await?;
    success_response(page)
}

/// GET /api/v1/withdrawals/:id
pub async fn withdrawal(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<WithdrawRequest> {
    let request = state.settlement.find(id).await?;
    // 不区分"不存在"与"不属于你"
    if request.user_id != user_id {
        return Err(AppError::from(CoreError::NotFound(format!(
            "withdraw request {}",
            id
        ))));
    }
    success_response(request)
}
