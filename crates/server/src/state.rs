//! Application State
//!
//! Shared state across all handlers.

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use std::sync::Arc;

use callguard_config::Settings;
use callguard_screening::{ScreeningEngine, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub engine: Arc<ScreeningEngine>,
    /// Absent when metrics are disabled or the recorder was already taken
    pub metrics: Option<PrometheusHandle>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Settings, engine: Arc<ScreeningEngine>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            engine,
            metrics: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Clone of the current settings; never hold the lock across an await
    pub fn get_config(&self) -> Settings {
        self.config.read().clone()
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        self.engine.registry()
    }
}
