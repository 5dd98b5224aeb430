//! Where roster data comes from.
//!
//! A [`SourceConnector`] opens one logged-in [`RosterSource`] per sync cycle;
//! the session is dropped when the cycle ends.

pub mod parse;
pub mod portal;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::NewStudent;

pub use portal::{PortalConfig, PortalConnector, PortalSession};

/// One line of a class-group roster page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStudentRow {
    pub student_external_id: Option<String>,
    pub name: String,
    pub grade_class: Option<String>,
    pub seat_number: Option<String>,
    /// `N-M` code of the club the roster page belongs to.
    pub club_code: String,
}

impl RawStudentRow {
    pub fn to_new_student(&self) -> NewStudent {
        NewStudent {
            student_name: self.name.clone(),
            student_external_id: self.student_external_id.clone(),
            grade_class: self.grade_class.clone(),
            seat_number: self.seat_number.clone(),
        }
    }
}

#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Date the current enrollment window opens, as printed by the portal.
    async fn fetch_enrollment_window_date(&self) -> Result<Option<String>, AppError>;

    /// Club code to display name.
    async fn fetch_club_directory(&self) -> Result<HashMap<String, String>, AppError>;

    async fn fetch_group_roster(&self, class_group_id: u32) -> Result<Vec<RawStudentRow>, AppError>;
}

#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn RosterSource>, AppError>;
}
