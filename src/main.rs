//! kusdcore 主入口

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use kusdcore::{
    api,
    app_state::{AppState, Stores},
    config::{Config, LockBackend},
    infrastructure::{db, distributed_lock::DistributedLock, logging, user_lock::UserLocks},
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 环境变量与配置
    dotenvy::dotenv().ok();

    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;

    // 2. 日志（guard 必须存活到进程结束，否则文件日志丢失）
    let _log_guard = logging::init_logging(&config.logging)?;
    tracing::info!(
        bind_addr = %config.server.bind_addr,
        lock_backend = ?config.risk.lock_backend,
        "Starting kusdcore"
    );

    // 3. 数据库
    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database pool")?;
    tracing::info!("Database pool initialized");

    if config.server.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        tracing::info!("Migrations applied");
    }

    // 4. 每用户锁
    let lock_wait = Duration::from_millis(config.risk.lock_wait_ms);
    let locks = match config.risk.lock_backend {
        LockBackend::Local => UserLocks::local(lock_wait),
        LockBackend::Redis => {
            let lock = DistributedLock::new(&config.redis.url)
                .await
                .context("Failed to initialize Redis lock")?;
            UserLocks::redis(lock, config.risk.lock_ttl_secs, lock_wait)
        }
    };
    tracing::info!(backend = locks.backend_name(), "Per-user locks initialized");

    // 5. 应用状态与路由
    let config = Arc::new(config);
    let stores = Stores::postgres(&pool);
    let state = Arc::new(AppState::new(config.clone(), stores, locks, Some(pool)));
    let app = api::routes(state);

    // 6. 启动服务
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    tracing::info!("Server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
