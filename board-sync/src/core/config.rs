use std::path::PathBuf;
use std::time::Duration;

use shared::models::{DEFAULT_ROOM, RoomId};

use crate::feed::FeedConfig;
use crate::sequence::RetryPolicy;

/// 看板配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（启动时先读取 `.env`）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | BOARD_DB_FILE | board.redb | 文档数据库文件名 |
/// | SETTINGS_DB_FILE | settings.redb | 本机设置文件名 |
/// | DEFAULT_ROOM | moca-2026 | 默认房间号 |
/// | SEQUENCE_MAX_ATTEMPTS | 20 | 订单号事务最大尝试次数 |
/// | SEQUENCE_BACKOFF_MS | 10 | 订单号重试首次退避窗口(毫秒) |
/// | SEQUENCE_MAX_BACKOFF_MS | 320 | 订单号重试退避窗口上限(毫秒) |
/// | FEED_MAX_RETRIES | 5 | 订阅查询失败重试次数 |
/// | FEED_RETRY_DELAY_MS | 200 | 订阅重试间隔(毫秒) |
/// | FEED_CHANNEL_CAPACITY | 1024 | 变更通知缓冲 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 日志目录，设置后写入文件 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/board DEFAULT_ROOM=shop-1 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放数据库文件
    pub work_dir: PathBuf,
    pub board_db_file: String,
    pub settings_db_file: String,
    /// 提示输入被取消时使用的房间
    pub default_room: RoomId,
    pub sequence_max_attempts: u32,
    pub sequence_backoff_ms: u64,
    pub sequence_max_backoff_ms: u64,
    pub feed_max_retries: u32,
    pub feed_retry_delay_ms: u64,
    pub feed_channel_capacity: usize,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let retry = RetryPolicy::default();
        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            board_db_file: env_or("BOARD_DB_FILE", "board.redb".to_string()),
            settings_db_file: env_or("SETTINGS_DB_FILE", "settings.redb".to_string()),
            default_room: RoomId::normalize(&env_or("DEFAULT_ROOM", DEFAULT_ROOM.to_string())),
            sequence_max_attempts: env_or("SEQUENCE_MAX_ATTEMPTS", retry.max_attempts).max(1),
            sequence_backoff_ms: env_or("SEQUENCE_BACKOFF_MS", retry.base_delay.as_millis() as u64),
            sequence_max_backoff_ms: env_or(
                "SEQUENCE_MAX_BACKOFF_MS",
                retry.max_delay.as_millis() as u64,
            ),
            feed_max_retries: env_or("FEED_MAX_RETRIES", 5),
            feed_retry_delay_ms: env_or("FEED_RETRY_DELAY_MS", 200),
            feed_channel_capacity: env_or("FEED_CHANNEL_CAPACITY", 1024usize).max(1),
            log_level: env_or("LOG_LEVEL", "info".to_string()),
            log_dir: std::env::var("LOG_DIR").ok().map(PathBuf::from),
            environment: env_or("ENVIRONMENT", "development".to_string()),
        }
    }

    /// 使用指定工作目录
    ///
    /// 常用于测试场景
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    pub fn board_db_path(&self) -> PathBuf {
        self.work_dir.join(&self.board_db_file)
    }

    pub fn settings_db_path(&self) -> PathBuf {
        self.work_dir.join(&self.settings_db_file)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sequence_max_attempts,
            Duration::from_millis(self.sequence_backoff_ms),
            Duration::from_millis(self.sequence_max_backoff_ms),
        )
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            max_retries: self.feed_max_retries,
            retry_delay: Duration::from_millis(self.feed_retry_delay_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
