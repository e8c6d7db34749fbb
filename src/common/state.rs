use std::sync::Arc;

use crate::config::Config;
use crate::station::{ApiClient, StationApi};
use crate::sync::SyncEngine;

/// Shared handler state. Generic over the station API so the router can be
/// driven against an in-memory collaborator.
pub struct AppState<S = ApiClient> {
    pub config: Arc<Config>,
    pub engine: Arc<SyncEngine<S>>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: StationApi> AppState<S> {
    pub fn new(config: Config, api: S) -> Self {
        let engine = SyncEngine::new(api, &config);
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}
