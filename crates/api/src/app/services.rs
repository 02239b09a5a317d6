use std::sync::Arc;

use tracing::info;

use loomerp_bom::VersionEvent;
use loomerp_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use loomerp_infra::{
    AppConfig, BomEngine, InMemoryBomRepository, InMemoryItemCatalog, VersionLifecycleManager,
};

pub type VersionBus = Arc<InMemoryEventBus<EventEnvelope<VersionEvent>>>;
pub type Repository = Arc<InMemoryBomRepository>;
pub type Catalog = Arc<InMemoryItemCatalog>;

/// Shared services handed to every handler.
pub struct AppServices {
    pub catalog: Catalog,
    pub versions: VersionLifecycleManager<Repository, VersionBus>,
    pub engine: BomEngine<Repository, Catalog>,
}

pub fn build_services(config: &AppConfig) -> AppServices {
    let repo: Repository = Arc::new(InMemoryBomRepository::new());
    let catalog: Catalog = Arc::new(InMemoryItemCatalog::new());
    let bus: VersionBus = Arc::new(InMemoryEventBus::new());

    spawn_event_log(bus.subscribe());

    let max_depth = config.engine.max_tree_depth;
    AppServices {
        versions: VersionLifecycleManager::new(Arc::clone(&repo), bus).with_max_depth(max_depth),
        engine: BomEngine::new(repo, Arc::clone(&catalog)).with_max_depth(max_depth),
        catalog,
    }
}

/// Log every committed lifecycle event. The thread ends when the bus is dropped.
fn spawn_event_log(events: Subscription<EventEnvelope<VersionEvent>>) {
    std::thread::spawn(move || {
        while let Ok(envelope) = events.recv() {
            info!(
                event_type = envelope.event_type(),
                schema_version = envelope.schema_version(),
                aggregate_id = %envelope.aggregate_id(),
                revision = envelope.revision(),
                "bom version event"
            );
        }
    });
}
