//! 每用户串行化
//!
//! 同一用户的风控评估与提现落库必须在同一把锁内完成，否则两个并发请求
//! 会读到彼此不可见的日累计额。单实例用进程内锁，多实例用 Redis 锁。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::OwnedMutexGuard;

use crate::{
    error::{CoreError, CoreResult},
    infrastructure::distributed_lock::{DistributedLock, LockGuard},
};

/// 进程内锁表超过该规模时清理空闲条目
const LOCAL_PRUNE_THRESHOLD: usize = 1024;

enum Backend {
    Local(Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>),
    Redis { lock: DistributedLock, ttl_secs: u64 },
}

pub struct UserLocks {
    backend: Backend,
    wait: Duration,
}

/// 持有期间同一用户的其他提交会等待
pub enum UserLockGuard {
    Local(OwnedMutexGuard<()>),
    Redis(LockGuard),
}

impl UserLocks {
    pub fn local(wait: Duration) -> Self {
        Self {
            backend: Backend::Local(Mutex::new(HashMap::new())),
            wait,
        }
    }

    pub fn redis(lock: DistributedLock, ttl_secs: u64, wait: Duration) -> Self {
        Self {
            backend: Backend::Redis { lock, ttl_secs },
            wait,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Local(_) => "local",
            Backend::Redis { .. } => "redis",
        }
    }

    pub async fn lock(&self, user_id: i64) -> CoreResult<UserLockGuard> {
        match &self.backend {
            Backend::Local(table) => {
                let mutex = {
                    let mut table = table.lock().unwrap_or_else(|e| e.into_inner());
                    if table.len() > LOCAL_PRUNE_THRESHOLD {
                        table.retain(|_, m| Arc::strong_count(m) > 1);
                    }
                    table.entry(user_id).or_default().clone()
                };

                tokio::time::timeout(self.wait, mutex.lock_owned())
                    .await
                    .map(UserLockGuard::Local)
                    .map_err(|_| {
                        tracing::warn!(user_id = user_id, "Timed out waiting for user lock");
                        CoreError::LockUnavailable(format!("user {}", user_id))
                    })
            }
            Backend::Redis { lock, ttl_secs } => {
                let key = format!("kusd:withdraw:user:{}", user_id);
                lock.acquire(&key, *ttl_secs, self.wait)
                    .await
                    .map(UserLockGuard::Redis)
                    .map_err(|e| {
                        tracing::warn!(user_id = user_id, error = %e, "Failed to acquire user lock");
                        CoreError::LockUnavailable(format!("user {}", user_id))
                    })
            }
        }
    }
}
