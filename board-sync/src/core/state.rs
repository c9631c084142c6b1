use std::sync::Arc;

use shared::models::RoomId;

use crate::core::Config;
use crate::feed::ChangeFeed;
use crate::orders::OrderStore;
use crate::recipes::RecipeStore;
use crate::room::{AcceptDefault, LocalSettings, RoomPrompt, RoomResolver};
use crate::sequence::SequenceAllocator;
use crate::store::{DocumentStore, RedbStore};
use crate::utils::{AppError, AppResult};

/// 看板状态 - 持有所有服务的共享引用
///
/// Cloning is cheap (`Arc` inside). Room-scoped stores are created on demand
/// with [`recipes()`](Self::recipes) / [`orders()`](Self::orders).
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | store | 文档存储 |
/// | feed | 实时订阅 |
/// | allocator | 订单号分配 |
/// | resolver | 房间号解析 |
#[derive(Clone)]
pub struct BoardState {
    pub config: Config,
    store: Arc<dyn DocumentStore>,
    feed: ChangeFeed,
    allocator: SequenceAllocator,
    resolver: Arc<RoomResolver>,
}

impl BoardState {
    /// Wire services over an existing store and settings
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        resolver: RoomResolver,
    ) -> Self {
        let feed = ChangeFeed::new(store.clone(), config.feed_config());
        let allocator = SequenceAllocator::new(store.clone(), config.retry_policy());
        Self {
            config,
            store,
            feed,
            allocator,
            resolver: Arc::new(resolver),
        }
    }

    /// 初始化看板状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录 (确保目录存在)
    /// 2. 文档数据库 (work_dir/board.redb)
    /// 3. 本机设置 (work_dir/settings.redb)
    /// 4. 各服务 (ChangeFeed, SequenceAllocator, RoomResolver)
    pub fn initialize(config: &Config) -> AppResult<Self> {
        Self::initialize_with_prompt(config, Arc::new(AcceptDefault))
    }

    pub fn initialize_with_prompt(
        config: &Config,
        prompt: Arc<dyn RoomPrompt>,
    ) -> AppResult<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            AppError::internal(format!(
                "Failed to create work dir {}: {}",
                config.work_dir.display(),
                e
            ))
        })?;

        let store = RedbStore::open(config.board_db_path(), config.feed_channel_capacity)?;
        let settings = LocalSettings::open(config.settings_db_path())?;
        let resolver = RoomResolver::new(Arc::new(settings), prompt, config.default_room.clone());

        tracing::info!(
            work_dir = %config.work_dir.display(),
            environment = %config.environment,
            "Board state initialized"
        );
        Ok(Self::new(config.clone(), Arc::new(store), resolver))
    }

    /// Everything in memory (tests, demos)
    pub fn in_memory(config: Config) -> AppResult<Self> {
        let store = RedbStore::in_memory()?;
        let settings = LocalSettings::in_memory()?;
        let resolver = RoomResolver::new(
            Arc::new(settings),
            Arc::new(AcceptDefault),
            config.default_room.clone(),
        );
        Ok(Self::new(config, Arc::new(store), resolver))
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn allocator(&self) -> &SequenceAllocator {
        &self.allocator
    }

    pub fn room_resolver(&self) -> &RoomResolver {
        &self.resolver
    }

    /// Room of this device (prompts on first use)
    pub fn resolve_room(&self) -> RoomId {
        self.resolver.resolve()
    }

    pub fn recipes(&self, room: &RoomId) -> RecipeStore {
        RecipeStore::new(self.store.clone(), self.feed.clone(), room.clone())
    }

    pub fn orders(&self, room: &RoomId) -> OrderStore {
        OrderStore::new(
            self.store.clone(),
            self.feed.clone(),
            self.allocator.clone(),
            room.clone(),
        )
    }
}
