//! 存储调用超时
//!
//! 所有外部存储往返都经过 `bounded`：超时即中止当前决策，按内部错误上报。

use std::{future::Future, time::Duration};

use crate::error::{CoreError, CoreResult};

/// 在 `limit` 内等待 `fut`，超时返回 `CoreError::Timeout`
pub async fn bounded<T, E, F>(limit: Duration, operation: &'static str, fut: F) -> CoreResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<CoreError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::warn!(
                operation = operation,
                timeout_ms = limit.as_millis() as u64,
                "Store call timed out"
            );
            Err(CoreError::Timeout { operation })
        }
    }
}
