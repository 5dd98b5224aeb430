use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: i64,
    pub club_id: i64,
    #[serde(default)]
    pub student_external_id: Option<String>,
    pub student_name: String,
    #[serde(default)]
    pub grade_class: Option<String>,
    #[serde(default)]
    pub seat_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub student_name: String,
    pub student_external_id: Option<String>,
    pub grade_class: Option<String>,
    pub seat_number: Option<String>,
}

impl NewStudent {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            student_name: name.into(),
            student_external_id: None,
            grade_class: None,
            seat_number: None,
        }
    }
}
