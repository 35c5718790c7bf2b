//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers
//! and to the background collection loop.

use shared::collector::{Collector, ExposedMetrics, QuerySet};
use shared::config::ConnectionDefaults;
use shared::connection::{ClickHouseConnector, Connector, InMemoryConnector};
use shared::control::ControlSurface;
use shared::registry::WatchedTargetRegistry;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Built once at startup; cloning shares the same registry and collector.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Control operations over the registry.
    control: ControlSurface,
    /// The collector filling the exposed metric set.
    collector: Arc<Collector>,
    /// Whether `/metrics` runs a pass before rendering.
    collect_on_scrape: bool,
}

impl AppState {
    /// Creates a new application state collecting through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, defaults: ConnectionDefaults) -> Self {
        let registry = Arc::new(WatchedTargetRegistry::new());
        let collector = Collector::new(
            Arc::clone(&registry),
            connector,
            defaults,
            QuerySet::default(),
        );

        Self {
            control: ControlSurface::new(registry),
            collector: Arc::new(collector),
            collect_on_scrape: true,
        }
    }

    /// Creates a new application state talking to real `ClickHouse` servers.
    #[must_use]
    pub fn with_clickhouse(defaults: ConnectionDefaults) -> Self {
        Self::new(Arc::new(ClickHouseConnector::new()), defaults)
    }

    /// Creates a new application state over an in-memory backend.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_connector(connector: InMemoryConnector) -> Self {
        Self::new(Arc::new(connector), ConnectionDefaults::default())
    }

    /// Sets whether `/metrics` runs a pass before rendering.
    #[must_use]
    pub fn with_collect_on_scrape(mut self, enabled: bool) -> Self {
        self.collect_on_scrape = enabled;
        self
    }

    /// Returns the control surface.
    #[must_use]
    pub fn control(&self) -> &ControlSurface {
        &self.control
    }

    /// Returns the collector.
    #[must_use]
    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    /// Returns the watched-target registry.
    #[must_use]
    pub fn registry(&self) -> &WatchedTargetRegistry {
        self.collector.registry()
    }

    /// Returns the exposed metric set.
    #[must_use]
    pub fn exposed(&self) -> &ExposedMetrics {
        self.collector.exposed()
    }

    /// Returns `true` if `/metrics` runs a pass before rendering.
    #[must_use]
    pub fn collect_on_scrape(&self) -> bool {
        self.collect_on_scrape
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_in_memory_connector(InMemoryConnector::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::control::ControlOp;
    use shared::models::Target;

    #[test]
    fn test_app_state_control_writes_collector_registry() {
        let state = AppState::default();

        state
            .control()
            .apply(ControlOp::Upsert(Target::new(
                "default",
                "chi-a",
                vec!["h0".to_string()],
            )))
            .unwrap();

        assert_eq!(state.registry().len(), 1);
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = AppState::default();
        let state2 = state.clone();

        state.registry().upsert(Target::new("default", "chi-a", vec!["h0".to_string()]));

        assert_eq!(state2.registry().len(), 1);
        assert!(Arc::ptr_eq(state.collector(), state2.collector()));
    }

    #[test]
    fn test_collect_on_scrape_toggle() {
        let state = AppState::default().with_collect_on_scrape(false);
        assert!(!state.collect_on_scrape());
    }
}
