//! Board Sync - 房间级点餐看板同步核心
//!
//! # 架构概述
//!
//! 多个独立客户端（顾客菜单、厨房看板、菜谱编辑）共享同一个房间下的
//! 菜谱与订单：
//!
//! - **房间** (`room`): 设备首次使用时确定房间号并保存在本机
//! - **订单号** (`sequence`): 基于存储条件写的乐观事务，房间内严格递增
//! - **菜谱** (`recipes`): CRUD、封面切换协议、菜单派生
//! - **订单** (`orders`): 购物车下单、状态轮转
//! - **订阅** (`feed`): 每次变更推送整集合有序快照
//! - **存储** (`store`): 文档存储抽象 + redb 实现
//!
//! # 模块结构
//!
//! ```text
//! board-sync/src/
//! ├── core/          # 配置、状态装配
//! ├── store/         # DocumentStore trait, RedbStore
//! ├── feed/          # ChangeFeed, Subscription
//! ├── sequence/      # SequenceAllocator, RetryPolicy
//! ├── room/          # RoomResolver, LocalSettings
//! ├── recipes/       # RecipeStore, 派生函数
//! ├── orders/        # OrderStore
//! └── utils/         # 错误映射、日志
//! ```

pub mod core;
pub mod feed;
pub mod orders;
pub mod recipes;
pub mod room;
pub mod sequence;
pub mod store;
pub mod utils;

// Re-export 公共类型
pub use core::{BoardState, Config};
pub use feed::{ChangeFeed, FeedConfig, Subscription};
pub use orders::OrderStore;
pub use recipes::RecipeStore;
pub use room::{RoomPrompt, RoomResolver};
pub use sequence::{RetryPolicy, SequenceAllocator, TxnOutcome};
pub use store::{DocumentStore, RedbStore, StoreError};
pub use utils::{AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Load `.env` and start logging from `LOG_LEVEL` / `LOG_DIR`
pub fn setup_environment() -> anyhow::Result<Config> {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    init_logger_with_file(&config.log_level, config.log_dir.as_deref())?;
    Ok(config)
}
