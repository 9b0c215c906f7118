use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use practice_backend::config::{Config, FunnelEnvConfig, GenerationConfig};
use practice_backend::funnel::config::FunnelConfig;
use practice_backend::funnel::engine::FunnelEngine;
use practice_backend::routes::build_router;
use practice_backend::services::generation::GenerationProvider;
use practice_backend::state::AppState;
use practice_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    #[allow(dead_code)]
    pub state: AppState,
    #[allow(dead_code)]
    pub config: Config,
    _temp_dir: TempDir,
}

/// 直接构造 Config，避免 set_var 在多线程测试中造成环境变量竞态
fn test_config(sled_path: String, generation_enabled: bool) -> Config {
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cors_origin: "http://localhost:5173".to_string(),
        funnel: FunnelEnvConfig {
            focus_ratio: 0.6,
            batch_min: 1,
            batch_max: 20,
            generation_max_attempts: 3,
        },
        generation: GenerationConfig {
            enabled: generation_enabled,
            mock: true,
            api_url: String::new(),
            api_key: String::new(),
            timeout_secs: 1,
        },
    }
}

async fn spawn(generation_enabled: bool) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("practice-test.sled");

    let config = test_config(sled_path.to_string_lossy().to_string(), generation_enabled);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let generation = Arc::new(GenerationProvider::new(&config.generation));
    let funnel = Arc::new(FunnelEngine::new(
        FunnelConfig::from_env(&config.funnel),
        store.clone(),
        generation,
    ));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store, funnel, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

/// Generation mock enabled: batches can always be filled.
pub async fn spawn_test_server() -> TestApp {
    spawn(true).await
}

/// Generation disabled: only seeded bank/verified pools can serve, which is
/// what shortfall and dedup tests want.
#[allow(dead_code)]
pub async fn spawn_test_server_without_generation() -> TestApp {
    spawn(false).await
}
