use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

/// Set up the global subscriber: human-readable stdout output, plus daily
/// rotating JSON files when file logs are enabled.
///
/// 返回的 guard 持有文件日志的后台写线程，调用方必须保存到进程退出，
/// 否则缓冲中的日志会丢失。
pub fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let stdout_layer = fmt::layer().with_target(true);
    let base = tracing_subscriber::registry().with(filter).with(stdout_layer);

    let (result, guard) = if config.enable_file_logs {
        let appender = rolling::daily(&config.log_dir, "monitor-backend.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false).json();
        (base.with(file_layer).try_init(), Some(guard))
    } else {
        (base.try_init(), None)
    };

    if let Err(e) = result {
        // 全局 subscriber 已存在（测试里多次初始化）不算错误
        if !e.to_string().contains("already been set") {
            panic!("Failed to initialize tracing: {e}");
        }
    }

    guard
}
