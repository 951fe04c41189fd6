use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::ObjectStore;
use crate::infrastructure::transcoder::JobSubmitter;
use crate::jobs::coordinator::JobCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub storage: Arc<dyn ObjectStore>,
    pub transcoder: Arc<dyn JobSubmitter>,
    pub coordinator: Arc<JobCoordinator>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        transcoder: Arc<dyn JobSubmitter>,
        coordinator: Arc<JobCoordinator>,
    ) -> Self {
        Self {
            config,
            storage,
            transcoder,
            coordinator,
        }
    }
}
