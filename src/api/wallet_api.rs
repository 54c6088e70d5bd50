//! 钱包 API：提现提交、充值地址

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    api::{
        middleware::AuthUser,
        response::{success_response, ApiResult},
    },
    app_state::AppState,
    service::{DepositAddress, WithdrawOutcome},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawBody {
    pub chain: String,
    pub asset: String,
    /// 十进制字符串，避免浮点精度损失
    pub amount: String,
    pub to_address: String,
}

/// POST /api/v1/withdraw
///
/// 风控拒绝不是错误：返回 200，`riskCheck.approved = false` 并附原因
pub async fn submit_withdraw(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<WithdrawBody>,
) -> ApiResult<WithdrawOutcome> {
    let outcome = state
        .admission
        .submit(
            user_id,
            &body.chain,
            &body.asset,
            &body.amount,
            &body.to_address,
        )
        .await?;
    success_response(outcome)
}

#[derive(Debug, Deserialize)]
pub struct DepositAddressQuery {
    pub chain: String,
    pub asset: String,
}

/// GET /api/v1/wallet/deposit-address?chain=ethereum&asset=USDT
pub async fn deposit_address(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<DepositAddressQuery>,
) -> ApiResult<DepositAddress> {
    let address = state
        .deposit_addresses
        .get_or_create(user_id, &query.chain, &query.asset)
        .await?;
    success_response(address)
}
