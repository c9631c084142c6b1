//! 核心模块 - 配置与状态
//!
//! - [`Config`] - 看板配置 (环境变量)
//! - [`BoardState`] - 服务装配

pub mod config;
pub mod state;

pub use config::Config;
pub use state::BoardState;
