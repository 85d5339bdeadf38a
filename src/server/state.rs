use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::history::HistorySampler;
use crate::presence::PresenceTracker;
use crate::stats::StatsAggregator;
use crate::store::StatsStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn StatsStore>,
    pub connection_manager: Arc<ConnectionManager>,
    pub tracker: Arc<PresenceTracker>,
    pub aggregator: Arc<StatsAggregator>,
    pub sampler: Arc<HistorySampler>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn StatsStore>) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let tracker = Arc::new(PresenceTracker::new(
            store.clone(),
            settings.stats.ttl_seconds,
        ));
        let aggregator = Arc::new(StatsAggregator::new(store.clone()));
        let sampler = Arc::new(HistorySampler::new(store.clone(), aggregator.clone()));

        Self {
            settings: Arc::new(settings),
            store,
            connection_manager,
            tracker,
            aggregator,
            sampler,
            start_time: Instant::now(),
        }
    }
}
