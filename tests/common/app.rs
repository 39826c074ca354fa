use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::watch;

use monitor_backend::config::{Config, GatewayConfig, SchedulerConfig};
use monitor_backend::dispatch::HostGateway;
use monitor_backend::report::ReportRunner;
use monitor_backend::routes::build_router;
use monitor_backend::state::AppState;
use monitor_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

/// Test instance: throwaway sled dir, mock gateway, no scheduler leader.
pub async fn spawn_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("monitor-test.sled");

    // 直接构造 Config，避免 set_var 造成多线程测试环境变量竞态
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3900,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        scheduler: SchedulerConfig { is_leader: false },
        gateway: GatewayConfig {
            enabled: true,
            mock: true,
            base_url: String::new(),
            api_token: String::new(),
            timeout_secs: 1,
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let gateway = Arc::new(HostGateway::new(&config.gateway));
    let runner = Arc::new(ReportRunner::new(
        store.clone(),
        gateway.clone(),
        gateway.clone(),
    ));

    let (config_tx, _config_rx) = watch::channel(store.get_monitor_config());

    let state = AppState::new(store, runner, None, config_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        _temp_dir: temp_dir,
    }
}
