use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::funnel::engine::FunnelEngine;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    funnel: Arc<FunnelEngine>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        funnel: Arc<FunnelEngine>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            funnel,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn funnel(&self) -> &FunnelEngine {
        &self.funnel
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;

    use super::*;
    use crate::funnel::config::FunnelConfig;
    use crate::services::generation::GenerationProvider;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(
            Store::open(tmp.path().join("state-test.sled").to_str().unwrap()).unwrap(),
        );
        let generation = Arc::new(GenerationProvider::new(&cfg.generation));
        let funnel = Arc::new(FunnelEngine::new(
            FunnelConfig::default(),
            store.clone(),
            generation,
        ));
        let (tx, _) = broadcast::channel(4);
        (tmp, AppState::new(store, funnel, &cfg, tx))
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let (_tmp, state) = test_state();

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        state.shutdown_tx().send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn uptime_is_monotonic() {
        let (_tmp, state) = test_state();
        assert!(state.uptime_secs() < 5);
    }
}
