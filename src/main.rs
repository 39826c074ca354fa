use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use monitor_backend::config::Config;
use monitor_backend::dispatch::HostGateway;
use monitor_backend::logging::{init_tracing, LogConfig};
use monitor_backend::report::ReportRunner;
use monitor_backend::routes::build_router;
use monitor_backend::scheduler::ReportScheduler;
use monitor_backend::state::AppState;
use monitor_backend::store::Store;
use monitor_backend::validation::parse_push_time;
use tokio::sync::{broadcast, watch};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    let _log_guard = init_tracing(&LogConfig {
        log_level: config.log_level.clone(),
        enable_file_logs: config.enable_file_logs,
        log_dir: config.log_dir.clone(),
    });
    tracing::info!("Starting monitor-backend");

    // 网关配置错误应在启动时立即暴露，而不是第一次推送时才失败
    HostGateway::validate_config(&config.gateway);

    let store = Arc::new(Store::open(&config.sled_path).expect("Failed to open sled database"));
    store.run_migrations().expect("Failed to run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let gateway = Arc::new(HostGateway::new(&config.gateway));
    let runner = Arc::new(ReportRunner::new(
        store.clone(),
        gateway.clone(),
        gateway.clone(),
    ));

    let monitor_config = store.get_monitor_config();
    let (config_tx, config_rx) = watch::channel(monitor_config);

    let scheduler = if config.scheduler.is_leader {
        match ReportScheduler::start(store.clone(), runner.clone()).await {
            Ok(scheduler) => Some(scheduler),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start report scheduler");
                None
            }
        }
    } else {
        tracing::info!("Scheduler leader disabled; reports handled elsewhere");
        None
    };

    if let Some(scheduler) = scheduler.clone() {
        tokio::spawn(rearm_on_config_change(scheduler.clone(), config_rx));

        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            scheduler.shutdown().await;
        });
    }

    let state = AppState::new(store.clone(), runner, scheduler, config_tx);

    let app = build_router(state)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()));

    if let Err(e) = server.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

/// Re-arm the report job whenever an admin update changes the push time.
/// A reconfigure during a firing run only affects the next arm.
async fn rearm_on_config_change(
    scheduler: Arc<ReportScheduler>,
    mut config_rx: watch::Receiver<monitor_backend::store::operations::monitor_config::MonitorConfig>,
) {
    let mut current_push_time = config_rx.borrow().push_time.clone();
    while config_rx.changed().await.is_ok() {
        let next_push_time = config_rx.borrow().push_time.clone();
        if next_push_time == current_push_time {
            continue;
        }
        match parse_push_time(&next_push_time) {
            Some(push_time) => {
                if let Err(error) = scheduler.arm(push_time).await {
                    tracing::error!(error = %error, "Failed to re-arm report job");
                } else {
                    current_push_time = next_push_time;
                }
            }
            None => {
                // 配置层已做过校验，这里只是兜底
                tracing::warn!(push_time = %next_push_time, "Ignoring unparseable push time");
            }
        }
    }
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origin.trim() == "*" {
        // 通配符模式仅用于开发环境
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
