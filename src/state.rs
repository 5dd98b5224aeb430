use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::source::SourceConnector;
use crate::store::RosterStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RosterStore>,
    pub connector: Arc<dyn SourceConnector>,
    pub sync: SyncConfig,
    /// Held for a whole sync cycle; the store has a single writer.
    pub sync_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RosterStore>,
        connector: Arc<dyn SourceConnector>,
        sync: SyncConfig,
    ) -> Self {
        Self {
            store,
            connector,
            sync,
            sync_lock: Arc::new(Mutex::new(())),
        }
    }
}
