use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A student row joined with its club and semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EnrollmentRow {
    pub semester_key: String,
    pub class_group_id: i64,
    pub club_code: String,
    pub club_name: String,
    pub student_external_id: Option<String>,
    pub student_name: String,
    pub grade_class: Option<String>,
    pub seat_number: Option<String>,
}
