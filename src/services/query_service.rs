use std::sync::Arc;

use tracing::debug;

use crate::error::AppError;
use crate::models::{EnrollmentRow, Semester};
use crate::store::RosterStore;

/// Read side: which clubs a student is in.
pub struct QueryService {
    store: Arc<dyn RosterStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RosterStore>) -> Self {
        Self { store }
    }

    /// Search by exact student name. An unknown `semester_key` does not fail
    /// the search; it just filters nothing.
    pub async fn search(
        &self,
        name: &str,
        semester_key: Option<&str>,
        grade_class: Option<&str>,
    ) -> Result<Vec<EnrollmentRow>, AppError> {
        let semester_id = match semester_key.filter(|k| !k.is_empty()) {
            Some(key) => {
                let found = self
                    .store
                    .list_semesters()
                    .await?
                    .into_iter()
                    .find(|s| s.semester_key == key);
                if found.is_none() {
                    debug!("No semester {}, searching all semesters", key);
                }
                found.map(|s| s.id)
            }
            None => None,
        };

        let grade_class = grade_class.filter(|g| !g.is_empty());
        self.store.search_students(name, semester_id, grade_class).await
    }

    pub async fn list_semesters(&self) -> Result<Vec<Semester>, AppError> {
        self.store.list_semesters().await
    }

    pub async fn latest_semester(&self) -> Result<Option<Semester>, AppError> {
        self.store.latest_semester().await
    }
}
