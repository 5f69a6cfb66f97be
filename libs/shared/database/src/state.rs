use std::sync::Arc;

use axum::extract::FromRef;
use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::memory::InMemoryStore;
use crate::store::ClinicStore;
use crate::supabase_store::SupabaseStore;

/// Shared state handed to every cell router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn ClinicStore>) -> Self {
        Self { config, store }
    }

    /// Builds the store selected by `CLINIC_STORAGE`.
    pub fn from_config(config: AppConfig) -> Self {
        let store: Arc<dyn ClinicStore> = match config.storage {
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                Arc::new(SupabaseStore::new(&config))
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Arc::new(InMemoryStore::new())
            }
        };
        Self::new(Arc::new(config), store)
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
