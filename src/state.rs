use std::sync::Arc;

use crate::config::FulfillmentConfig;
use crate::engine::coordinator::FulfillmentCoordinator;
use crate::engine::publisher::BroadcastPublisher;
use crate::observability::metrics::Metrics;
use crate::store::{FulfillmentStore, MemoryStore};

pub struct AppState {
    pub coordinator: FulfillmentCoordinator,
    pub events: BroadcastPublisher,
}

impl AppState {
    pub fn new(config: FulfillmentConfig, event_buffer_size: usize) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), config, event_buffer_size)
    }

    pub fn with_store(
        store: Arc<dyn FulfillmentStore>,
        config: FulfillmentConfig,
        event_buffer_size: usize,
    ) -> Self {
        let events = BroadcastPublisher::new(event_buffer_size);
        let coordinator = FulfillmentCoordinator::new(
            store,
            Arc::new(events.clone()),
            config,
            Metrics::new(),
        );

        Self {
            coordinator,
            events,
        }
    }
}
