use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::content_store::ContentStore;
use crate::modules::transcode::probe::MediaProbe;
use crate::modules::transcode::registry::JobRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub jobs: JobRegistry,
    pub storage: Arc<dyn ContentStore>,
    pub probe: Arc<dyn MediaProbe>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ContentStore>,
        probe: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            config,
            jobs: JobRegistry::new(),
            storage,
            probe,
        }
    }
}
