//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub withdrawal: WithdrawalSettings,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Redis配置（仅 lock_backend = "redis" 时使用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    #[serde(default)]
    pub run_migrations: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// 每用户串行化所用的锁后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    Local,
    Redis,
}

/// 风控运行参数
///
/// 阈值本身（日限额、KYC 限额等）来自 risk_configs 表，这里只放进程级参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    /// 单次存储调用超时
    pub store_timeout_ms: u64,
    /// 风控配置缓存 TTL
    pub config_cache_ttl_secs: u64,
    /// 7 日提现上限
    pub weekly_withdrawal_cap: Decimal,
    pub lock_ttl_secs: u64,
    pub lock_wait_ms: u64,
    pub lock_backend: LockBackend,
}

/// 提现参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalSettings {
    /// 手续费率（0.001 = 0.1%）
    pub fee_rate: Decimal,
    pub max_page_size: i64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@localhost:5432/kusd".into()),
            max_connections: std::env::var("DB_MAX_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            min_connections: std::env::var("DB_MIN_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            acquire_timeout_secs: std::env::var("DB_ACQ_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
            run_migrations: std::env::var("RUN_MIGRATIONS")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: std::env::var("LOG_FILE_ENABLED")
                .ok()
                .map(|v| v == "1")
                .unwrap_or(false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            store_timeout_ms: std::env::var("RISK_STORE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            config_cache_ttl_secs: std::env::var("RISK_CONFIG_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            weekly_withdrawal_cap: std::env::var("RISK_WEEKLY_WITHDRAWAL_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| Decimal::from(100_000)),
            lock_ttl_secs: std::env::var("RISK_LOCK_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            lock_wait_ms: std::env::var("RISK_LOCK_WAIT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5000),
            lock_backend: match std::env::var("RISK_LOCK_BACKEND").as_deref() {
                Ok("redis") => LockBackend::Redis,
                _ => LockBackend::Local,
            },
        }
    }
}

impl Default for WithdrawalSettings {
    fn default() -> Self {
        Self {
            fee_rate: std::env::var("WITHDRAW_FEE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| Decimal::new(1, 3)),
            max_page_size: std::env::var("RECORDS_MAX_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            risk: RiskSettings::default(),
            withdrawal: WithdrawalSettings::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.risk.store_timeout_ms == 0 {
            anyhow::bail!("risk.store_timeout_ms must be positive");
        }
        if self.risk.weekly_withdrawal_cap <= Decimal::ZERO {
            anyhow::bail!("risk.weekly_withdrawal_cap must be positive");
        }
        if self.withdrawal.fee_rate < Decimal::ZERO || self.withdrawal.fee_rate >= Decimal::ONE {
            anyhow::bail!("withdrawal.fee_rate must be in [0, 1)");
        }
        if self.withdrawal.max_page_size <= 0 {
            anyhow::bail!("withdrawal.max_page_size must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_env().unwrap();
        assert!(config.risk.store_timeout_ms > 0);
        assert!(config.withdrawal.max_page_size > 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgres://test@localhost/test"
max_connections = 20
min_connections = 5
acquire_timeout_secs = 30
idle_timeout_secs = 600

[redis]
url = "redis://localhost:6379"

[server]
bind_addr = "0.0.0.0:9090"

[logging]
level = "info"
format = "json"
enable_file_logging = false

[risk]
store_timeout_ms = 1500
config_cache_ttl_secs = 10
weekly_withdrawal_cap = "250000"
lock_ttl_secs = 15
lock_wait_ms = 2000
lock_backend = "redis"

[withdrawal]
fee_rate = "0.002"
max_page_size = 50
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.server.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.risk.lock_backend, LockBackend::Redis);
        assert_eq!(config.risk.weekly_withdrawal_cap, Decimal::from(250_000));
        assert_eq!(config.withdrawal.fee_rate, Decimal::new(2, 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_without_risk_sections_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgres://test@localhost/test"
max_connections = 4
min_connections = 1
acquire_timeout_secs = 5
idle_timeout_secs = 60

[redis]
url = "redis://localhost:6379"

[server]
bind_addr = "127.0.0.1:8088"

[logging]
level = "debug"
format = "text"
enable_file_logging = false
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.server.run_migrations);
        assert!(config.risk.lock_wait_ms > 0);
    }

    #[test]
    fn test_config_validation_rejects_bad_fee_rate() {
        let mut config = Config::from_env().unwrap();
        config.withdrawal.fee_rate = Decimal::from(2);
        assert!(config.validate().is_err());
    }
}
