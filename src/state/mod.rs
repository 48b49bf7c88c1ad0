use std::sync::Arc;

use crate::application::registry::SessionRegistry;
use crate::commands::CommandDispatcher;
use crate::domain::SessionConfig;
use crate::infra::channel::ChannelFactory;
use crate::infra::store::SettingsStore;

/// Shared process state: the session registry plus the settings store and
/// session configuration it was built with.
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn SettingsStore>,
    pub config: SessionConfig,
}

impl AppState {
    pub fn new(
        factory: Arc<dyn ChannelFactory>,
        store: Arc<dyn SettingsStore>,
        config: SessionConfig,
    ) -> Self {
        let registry = SessionRegistry::new(factory, store.clone(), config.clone());
        Self {
            registry,
            store,
            config,
        }
    }

    pub fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(self.registry.clone())
    }
}
