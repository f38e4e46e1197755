pub mod relay;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{completion::CompletionClient, store::Store},
};

pub use self::relay::{RelayProgress, RelayStage};

pub type SharedState = Arc<AppState>;

/// Central application state: the injected store, completion client and configuration.
///
/// Built once at startup; handlers only ever read it, so no locking is needed.
pub struct AppState {
    store: Arc<dyn Store>,
    completions: Arc<dyn CompletionClient>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        store: Arc<dyn Store>,
        completions: Arc<dyn CompletionClient>,
        config: AppConfig,
    ) -> SharedState {
        Arc::new(Self {
            store,
            completions,
            config,
        })
    }

    /// Shared persistence backend.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Client used to reach the chat-completion provider.
    pub fn completions(&self) -> &Arc<dyn CompletionClient> {
        &self.completions
    }

    /// Loaded runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
