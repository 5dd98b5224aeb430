use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::semester;
use crate::source::{RawStudentRow, SourceConnector};
use crate::store::RosterStore;

const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);

/// Refreshes the stored rosters of the portal's current semester.
pub struct SyncOrchestrator {
    store: Arc<dyn RosterStore>,
    connector: Arc<dyn SourceConnector>,
    request_delay: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub semester_id: i64,
    pub semester_key: String,
    pub source_date: String,
    /// False when cached data was kept and nothing was fetched.
    pub did_update: bool,
    pub clubs_saved: usize,
    pub students_saved: usize,
    pub groups_failed: usize,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn RosterStore>, connector: Arc<dyn SourceConnector>) -> Self {
        Self {
            store,
            connector,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    /// Pause between class-group requests, to stay gentle on the portal.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Run one sync cycle over `groups`.
    ///
    /// Without `force_update`, a semester that already owns any club is left
    /// untouched. With it, the semester is cleared and fetched again. A group
    /// whose fetch fails is skipped exactly like an empty group.
    pub async fn run(
        &self,
        groups: impl IntoIterator<Item = u32>,
        force_update: bool,
    ) -> Result<SyncOutcome, AppError> {
        info!("Starting roster sync (force_update: {})", force_update);
        let source = self.connector.open_session().await?;

        info!("Step 1: Resolving semester");
        let source_date = match source.fetch_enrollment_window_date().await {
            Ok(Some(date)) => date,
            Ok(None) => {
                let today = today();
                warn!("Portal shows no enrollment date, using today ({})", today);
                today
            }
            Err(e) => {
                let today = today();
                warn!("Failed to fetch enrollment date: {}; using today ({})", e, today);
                today
            }
        };
        let semester_key = semester::resolve(&source_date)?.to_string();
        let semester_id = self.store.get_or_create_semester(&source_date).await?;
        info!("Semester {} (id {}) from date {}", semester_key, semester_id, source_date);

        let mut outcome = SyncOutcome {
            semester_id,
            semester_key,
            source_date,
            did_update: false,
            clubs_saved: 0,
            students_saved: 0,
            groups_failed: 0,
        };

        info!("Step 2: Checking cache");
        if !force_update && self.store.is_cached(semester_id).await? {
            info!("Semester {} already cached, skipping update", outcome.semester_key);
            return Ok(outcome);
        }

        if force_update {
            info!("Clearing stored data of {}", outcome.semester_key);
            self.store.clear_semester(semester_id).await?;
        }

        info!("Step 3: Fetching club directory");
        let directory = match source.fetch_club_directory().await {
            Ok(directory) => directory,
            Err(e) => {
                warn!("Failed to fetch club directory, names will be placeholders: {}", e);
                HashMap::new()
            }
        };
        info!("Found {} clubs in directory", directory.len());

        info!("Step 4: Fetching class groups");
        for (index, class_group_id) in groups.into_iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let rows = match source.fetch_group_roster(class_group_id).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Failed to fetch class group {}: {}", class_group_id, e);
                    outcome.groups_failed += 1;
                    continue;
                }
            };

            if rows.is_empty() {
                debug!("Class group {} has no students", class_group_id);
                continue;
            }

            let saved = self
                .save_group(semester_id, class_group_id, &rows, &directory)
                .await?;
            outcome.clubs_saved += 1;
            outcome.students_saved += saved;
        }

        self.store.touch_semester(semester_id).await?;
        outcome.did_update = true;

        info!(
            "Sync completed: {} clubs, {} students, {} failed groups",
            outcome.clubs_saved, outcome.students_saved, outcome.groups_failed
        );
        Ok(outcome)
    }

    async fn save_group(
        &self,
        semester_id: i64,
        class_group_id: u32,
        rows: &[RawStudentRow],
        directory: &HashMap<String, String>,
    ) -> Result<usize, AppError> {
        let club_code = &rows[0].club_code;
        if rows.iter().any(|row| &row.club_code != club_code) {
            warn!(
                "Class group {} mixes club codes, using {}",
                class_group_id, club_code
            );
        }

        let club_name = directory
            .get(club_code)
            .cloned()
            .unwrap_or_else(|| unknown_club_name(club_code));

        let club_id = self
            .store
            .upsert_club(semester_id, i64::from(class_group_id), club_code, &club_name)
            .await?;

        for row in rows {
            self.store.insert_student(club_id, &row.to_new_student()).await?;
        }

        info!(
            "Class group {}: {} {} with {} students",
            class_group_id,
            club_code,
            club_name,
            rows.len()
        );
        Ok(rows.len())
    }
}

pub fn unknown_club_name(club_code: &str) -> String {
    format!("Unknown club ({})", club_code)
}

fn today() -> String {
    Local::now().format("%Y/%m/%d").to_string()
}
