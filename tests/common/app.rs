use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use phrasebot::config::{Config, WorkerConfig};
use phrasebot::routes::build_router;
use phrasebot::state::AppState;
use phrasebot::store::Store;

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn store(&self) -> &Store {
        self.state.store()
    }
}

pub async fn spawn_test_server() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("phrasebot-test.sled");

    // 直接构造 Config，避免 set_var 造成多线程测试环境变量竞态
    let config = Config {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        admin_token: Some(ADMIN_TOKEN.to_string()),
        worker: WorkerConfig {
            is_leader: false,
            due_scan_cron: "0 */10 * * * *".to_string(),
            message_cleanup_cron: "0 0 * * * *".to_string(),
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}
