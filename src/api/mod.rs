use std::sync::Arc;

use axum::{
    extract::State,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    api::response::{success_response, ApiResult},
    app_state::AppState,
};

pub mod middleware;
pub mod records_api;
pub mod response;
pub mod wallet_api;

#[derive(Debug, Serialize)]
pub struct Healthz {
    pub status: &'static str,
    pub database: Option<bool>,
}

/// GET /healthz
pub async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<Healthz> {
    let database = match &state.pool {
        Some(pool) => Some(crate::infrastructure::db::health_check(pool).await.is_ok()),
        None => None,
    };
    let status = if database == Some(false) { "degraded" } else { "ok" };
    success_response(Healthz { status, database })
}

pub fn routes(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/withdraw", post(wallet_api::submit_withdraw))
        .route("/wallet/deposit-address", get(wallet_api::deposit_address))
        .route("/portfolio/balance", get(records_api::balance))
        .route("/records", get(records_api::records))
        .route("/withdrawals", get(records_api::withdrawals))
        .route("/withdrawals/:id", get(records_api::withdrawal));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", v1)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::trace_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
