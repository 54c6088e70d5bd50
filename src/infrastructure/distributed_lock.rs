//! 分布式锁实现
//! 基于Redis的分布式锁，多实例部署时串行化同一用户的提现风控

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use redis::{aio::ConnectionManager, Client};
use uuid::Uuid;

/// 分布式锁
#[derive(Clone)]
pub struct DistributedLock {
    redis_client: ConnectionManager,
}

/// 锁守卫（Drop 时异步释放）
pub struct LockGuard {
    lock: DistributedLock,
    lock_key: String,
    lock_value: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let lock = self.lock.clone();
        let key = std::mem::take(&mut self.lock_key);
        let value = std::mem::take(&mut self.lock_value);

        tokio::spawn(async move {
            if let Err(e) = lock.release_internal(&key, &value).await {
                tracing::warn!(
                    error = ?e,
                    lock_key = %key,
                    "Failed to release lock in Drop"
                );
            }
        });
    }
}

impl DistributedLock {
    /// 创建分布式锁实例
    ///
    /// # 参数
    /// - `redis_url`: Redis连接字符串，格式：redis://host:port
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { redis_client: conn })
    }

    /// 获取分布式锁（重试直到成功或超时）
    ///
    /// - `ttl_secs`: 锁的过期时间，持有者崩溃时自动释放
    /// - `timeout`: 等待上限
    pub async fn acquire(
        &self,
        lock_key: &str,
        ttl_secs: u64,
        timeout: Duration,
    ) -> Result<LockGuard> {
        let lock_value = Uuid::new_v4().to_string();
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if self
                .try_acquire_internal(lock_key, &lock_value, ttl_secs)
                .await?
            {
                tracing::debug!(
                    lock_key = %lock_key,
                    attempt = attempt,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Acquired distributed lock"
                );

                return Ok(LockGuard {
                    lock: self.clone(),
                    lock_key: lock_key.to_string(),
                    lock_value,
                });
            }

            if start.elapsed() >= timeout {
                anyhow::bail!(
                    "Failed to acquire lock '{}' within {:?} after {} attempts",
                    lock_key,
                    timeout,
                    attempt
                );
            }

            // 指数退避（最大500ms）
            let backoff_ms = std::cmp::min(50 * 2u64.pow(attempt.min(4)), 500);
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        }
    }

    async fn try_acquire_internal(
        &self,
        lock_key: &str,
        lock_value: &str,
        ttl_secs: u64,
    ) -> Result<bool> {
        let mut conn = self.redis_client.clone();

        // SET key value NX EX ttl
        let result: Option<String> = redis::cmd("SET")
            .arg(lock_key)
            .arg(lock_value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .context("Failed to execute SET NX EX")?;

        Ok(result.is_some())
    }

    /// 释放锁：只有持有者（UUID 匹配）才能删除，Lua 脚本保证原子性
    async fn release_internal(&self, lock_key: &str, lock_value: &str) -> Result<()> {
        let mut conn = self.redis_client.clone();

        let script = r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
        "#;

        let result: i32 = redis::Script::new(script)
            .key(lock_key)
            .arg(lock_value)
            .invoke_async(&mut conn)
            .await
            .context("Failed to release lock")?;

        if result == 1 {
            tracing::debug!(lock_key = %lock_key, "Released distributed lock");
        } else {
            tracing::warn!(
                lock_key = %lock_key,
                "Lock not owned by current instance (may have expired)"
            );
        }

        Ok(())
    }
}
