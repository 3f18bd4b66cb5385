use axum::Router;
use tokio::sync::broadcast;

use gaze_remote::config::{Config, LimitsConfig, RemoteEnvConfig};
use gaze_remote::remote::orchestrator::RemoteControl;
use gaze_remote::routes::build_router;
use gaze_remote::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
}

pub fn test_config(limits: LimitsConfig) -> Config {
    // built directly: set_var races between parallel tests
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3100,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        limits,
        remote: RemoteEnvConfig::default(),
    }
}

pub async fn spawn_with(remote: RemoteControl, limits: LimitsConfig) -> TestApp {
    let config = test_config(limits);
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(remote, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with(RemoteControl::default(), LimitsConfig::default()).await
}
