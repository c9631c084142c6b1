//! Logging Infrastructure
//!
//! Console output always; with a log directory, an additional daily rotating
//! file under `{log_dir}/app/` (`board-sync.YYYY-MM-DD`).

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const FILE_PREFIX: &str = "board-sync";

/// Initialize console logging at `info`
pub fn init_logger() -> anyhow::Result<()> {
    init_logger_with_file("info", None)
}

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set. Calling this a second time is a
/// no-op (the first subscriber stays installed).
///
/// ```no_run
/// // Development setup (console only)
/// board_sync::init_logger_with_file("debug", None)?;
///
/// // Production setup (console + file)
/// board_sync::init_logger_with_file("info", Some(std::path::Path::new("./data/logs")))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logger_with_file(level: &str, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let file_layer = match log_dir {
        Some(dir) => {
            let app_log_dir = dir.join("app");
            fs::create_dir_all(&app_log_dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, app_log_dir, FILE_PREFIX);
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::sync::Mutex::new(appender))
                    .boxed(),
            )
        }
        None => None,
    };

    // 重复初始化（例如测试中）直接忽略
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(())
}

/// Delete rotated log files older than `days`
///
/// Returns how many files were removed.
pub fn cleanup_old_logs(log_dir: &Path, days: i64) -> anyhow::Result<usize> {
    let app_log_dir = log_dir.join("app");
    if !app_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Local::now().date_naive() - chrono::Duration::days(days);
    let prefix = format!("{}.", FILE_PREFIX);
    let mut removed = 0;

    for entry in fs::read_dir(app_log_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date_part) = name.strip_prefix(prefix.as_str())
            && let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }

    Ok(removed)
}
