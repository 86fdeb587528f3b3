use std::sync::Arc;

use crate::models::config::GameConfig;
use crate::services::{observer::PhaseObserver, phase_machine::PhaseMachine};
use crate::store::{DocumentStore, InMemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub machine: PhaseMachine,
    pub config: Arc<GameConfig>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(GameConfig::from_env())
    }

    pub fn with_config(config: GameConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, config: GameConfig) -> Self {
        AppState {
            machine: PhaseMachine::new(store.clone()),
            store,
            config: Arc::new(config),
        }
    }

    pub fn observer(&self) -> PhaseObserver {
        PhaseObserver::new(self.store.clone(), self.config.observer_debounce())
    }
}
