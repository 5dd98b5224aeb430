use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::semester::{SemesterKey, Term};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: i64,
    pub semester_key: String,
    pub academic_year: i32,
    pub term: Term,
    pub last_updated: String,
    pub source_date: String,
}

impl Semester {
    pub fn key(&self) -> SemesterKey {
        SemesterKey::new(self.academic_year, self.term)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Semester {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let term: String = row.try_get("term")?;
        let term = term.parse::<Term>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "term".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            semester_key: row.try_get("semester_key")?,
            academic_year: row.try_get("academic_year")?,
            term,
            last_updated: row.try_get("last_updated")?,
            source_date: row.try_get("source_date")?,
        })
    }
}
