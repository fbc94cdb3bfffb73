use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::repository::VehicleRepository;
use crate::storage::{ObjectStore, StorageError, SupabaseStorage};
use crate::store::Store;

/// The shared application state.
///
/// Cloned into every handler by axum; everything inside is either immutable
/// or internally synchronized.
#[derive(Clone)]
pub struct AppState {
    /// Configuration snapshot taken at startup.
    pub config: Arc<AppConfig>,
    /// Catalog queries over the lazily connected store.
    pub repo: VehicleRepository,
    /// Image storage, `None` when not configured.
    pub storage: Option<Arc<dyn ObjectStore>>,
    pub metrics: Metrics,
}

impl AppState {
    /// Builds the state from configuration. The database is not touched
    /// until the first request needs it.
    pub fn new(config: AppConfig) -> Self {
        let store = Store::new(&config.database);
        let storage: Option<Arc<dyn ObjectStore>> = if config.has_storage() {
            match SupabaseStorage::new(&config.storage) {
                Ok(s) => Some(Arc::new(s)),
                Err(StorageError::NotConfigured) => None,
                Err(e) => {
                    tracing::warn!("Image storage disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };
        Self::with_parts(config, store, storage)
    }

    /// Assembles the state from explicit parts.
    pub fn with_parts(config: AppConfig, store: Store, storage: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { config: Arc::new(config), repo: VehicleRepository::new(store), storage, metrics: Metrics::new() }
    }
}
