//! 已认证用户提取
//!
//! 认证由上游网关完成，网关校验会话后写入 `x-user-id` 头。本服务只信任该头。

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authenticated user"))?;

        raw.trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(AuthUser)
            .ok_or_else(|| AppError::unauthorized("Invalid authenticated user"))
    }
}
