//! Headless kitchen monitor: logs every order snapshot of the device's room.

use board_sync::{BoardState, cleanup_old_logs, setup_environment};

/// Rotated log files kept on disk
const LOG_RETENTION_DAYS: i64 = 14;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志) 并加载配置
    let config = setup_environment()?;
    if let Some(dir) = config.log_dir.as_deref() {
        cleanup_old_logs(dir, LOG_RETENTION_DAYS)?;
    }

    // 2. 初始化看板状态
    let state = BoardState::initialize(&config)?;
    let room = state.resolve_room();
    tracing::info!(room = %room, "Board monitor starting");

    // 3. 订阅订单
    let orders = state.orders(&room);
    let _subscription = orders.subscribe(|snapshot| {
        let open = snapshot
            .iter()
            .filter(|o| o.status != shared::OrderStatus::Done)
            .count();
        tracing::info!(total = snapshot.len(), open, "Orders updated");
        for order in snapshot.iter().take(5) {
            tracing::info!(no = %order.no, status = %order.status, items = order.item_count(), "  {}", order.time);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Board monitor stopped");
    Ok(())
}
