pub mod query_service;
pub mod sync_service;

pub use query_service::QueryService;
pub use sync_service::{SyncOrchestrator, SyncOutcome};
