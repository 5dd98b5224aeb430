//! Roster persistence.
//!
//! Two interchangeable backends implement [`RosterStore`]: the embedded
//! SQLite store and a remote tabular store reached over HTTP. [`open`] picks
//! one at startup; callers only ever see `Arc<dyn RosterStore>`.

pub mod remote;
pub mod sqlite;
pub mod table;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::models::{EnrollmentRow, NewStudent, Semester};

pub use remote::RemoteRosterStore;
pub use sqlite::SqliteRosterStore;
pub use table::{HttpTableClient, MemoryTableClient, RemoteStoreConfig, TableClient};

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub database_url: String,
    pub remote: Option<RemoteStoreConfig>,
}

#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Short backend name, for logs and health output.
    fn backend(&self) -> &'static str;

    /// Resolve `date` to its semester and return that semester's id, creating
    /// the row on first sight. Never creates a second row for the same key.
    async fn get_or_create_semester(&self, date: &str) -> Result<i64, AppError>;

    /// True iff the semester owns at least one club.
    async fn is_cached(&self, semester_id: i64) -> Result<bool, AppError>;

    /// Insert the club for `(semester_id, class_group_id)` or overwrite its
    /// code and name in place. Returns the (stable) club id.
    async fn upsert_club(
        &self,
        semester_id: i64,
        class_group_id: i64,
        club_code: &str,
        club_name: &str,
    ) -> Result<i64, AppError>;

    async fn insert_student(&self, club_id: i64, student: &NewStudent) -> Result<i64, AppError>;

    /// Delete every student and club of the semester. The semester row stays.
    async fn clear_semester(&self, semester_id: i64) -> Result<(), AppError>;

    async fn touch_semester(&self, semester_id: i64) -> Result<(), AppError>;

    /// Exact, case-sensitive name match. Newest semester first, then by
    /// class-group slot.
    async fn search_students(
        &self,
        name: &str,
        semester_id: Option<i64>,
        grade_class: Option<&str>,
    ) -> Result<Vec<EnrollmentRow>, AppError>;

    /// Newest semester first.
    async fn list_semesters(&self) -> Result<Vec<Semester>, AppError>;

    async fn latest_semester(&self) -> Result<Option<Semester>, AppError> {
        Ok(self.list_semesters().await?.into_iter().next())
    }
}

/// Open the configured backend. A remote store that cannot be reached falls
/// back to the local database.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RosterStore>, AppError> {
    let remote = match &config.remote {
        Some(remote_config) => match HttpTableClient::new(remote_config.clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Failed to build remote store client: {}", e);
                None
            }
        },
        None => None,
    };

    open_with(remote, &config.database_url).await
}

pub async fn open_with<C>(
    remote: Option<C>,
    database_url: &str,
) -> Result<Arc<dyn RosterStore>, AppError>
where
    C: TableClient + 'static,
{
    if let Some(client) = remote {
        match client.read_table(table::SEMESTERS).await {
            Ok(_) => {
                info!("Using remote roster store");
                return Ok(Arc::new(RemoteRosterStore::new(client)));
            }
            Err(e) => {
                warn!("Remote store unavailable, falling back to local database: {}", e);
            }
        }
    }

    let store = SqliteRosterStore::connect(database_url).await?;
    info!("Using local roster store at {}", database_url);
    Ok(Arc::new(store))
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreachableTables;

    #[async_trait]
    impl TableClient for UnreachableTables {
        async fn read_table(&self, _name: &str) -> Result<Vec<serde_json::Value>, AppError> {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        }

        async fn write_table(
            &self,
            _name: &str,
            _rows: Vec<serde_json::Value>,
        ) -> Result<(), AppError> {
            Err(AppError::StoreUnavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unreachable_remote_falls_back_to_sqlite() {
        let store = open_with(Some(UnreachableTables), "sqlite::memory:")
            .await
            .expect("fallback should succeed");
        assert_eq!(store.backend(), "sqlite");

        let id = store.get_or_create_semester("2026/3/1").await.unwrap();
        assert!(!store.is_cached(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reachable_remote_is_selected() {
        let store = open_with(Some(MemoryTableClient::new()), "sqlite::memory:")
            .await
            .unwrap();
        assert_eq!(store.backend(), "remote");
    }

    #[tokio::test]
    async fn test_no_remote_uses_sqlite() {
        let store = open_with(None::<MemoryTableClient>, "sqlite::memory:")
            .await
            .unwrap();
        assert_eq!(store.backend(), "sqlite");
    }

    #[tokio::test]
    async fn test_latest_semester_is_newest() {
        let store = open_with(None::<MemoryTableClient>, "sqlite::memory:")
            .await
            .unwrap();
        assert!(store.latest_semester().await.unwrap().is_none());

        store.get_or_create_semester("2026/3/1").await.unwrap();
        store.get_or_create_semester("2026/9/1").await.unwrap();
        store.get_or_create_semester("2025/9/1").await.unwrap();

        let latest = store.latest_semester().await.unwrap().unwrap();
        assert_eq!(latest.semester_key, "115上");
    }
}
