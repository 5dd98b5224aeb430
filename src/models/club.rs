use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One club per class-group slot per semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Club {
    pub id: i64,
    pub semester_id: i64,
    pub class_group_id: i64,
    pub club_code: String,
    pub club_name: String,
}
