use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::AppError;
use crate::models::{EnrollmentRow, NewStudent, Semester};
use crate::semester;
use crate::store::{RosterStore, now};

#[derive(Clone)]
pub struct SqliteRosterStore {
    db: SqlitePool,
}

impl SqliteRosterStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `database_url` and bring its
    /// schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let db = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("{}: {}", database_url, e)))?;

        sqlx::migrate!("./migrations").run(&db).await?;

        Ok(Self::new(db))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    async fn find_semester_id(&self, semester_key: &str) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM semesters WHERE semester_key = ?1")
            .bind(semester_key)
            .fetch_optional(&self.db)
            .await
    }
}

#[async_trait]
impl RosterStore for SqliteRosterStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn get_or_create_semester(&self, date: &str) -> Result<i64, AppError> {
        let key = semester::resolve(date)?;
        let semester_key = key.to_string();

        if let Some(id) = self.find_semester_id(&semester_key).await? {
            return Ok(id);
        }

        // A concurrent caller may insert the same key between the lookup and here.
        sqlx::query(
            r#"
            INSERT INTO semesters
                (semester_key, academic_year, term, last_updated, source_date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(semester_key) DO NOTHING
            "#,
        )
        .bind(&semester_key)
        .bind(key.academic_year)
        .bind(key.term.glyph())
        .bind(now())
        .bind(date)
        .execute(&self.db)
        .await?;

        self.find_semester_id(&semester_key)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn is_cached(&self, semester_id: i64) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clubs WHERE semester_id = ?1")
            .bind(semester_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn upsert_club(
        &self,
        semester_id: i64,
        class_group_id: i64,
        club_code: &str,
        club_name: &str,
    ) -> Result<i64, AppError> {
        // Update in place so the club id, and the students pointing at it, survive.
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO clubs (semester_id, class_group_id, club_code, club_name)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(semester_id, class_group_id) DO UPDATE
            SET club_code = excluded.club_code,
                club_name = excluded.club_name
            RETURNING id
            "#,
        )
        .bind(semester_id)
        .bind(class_group_id)
        .bind(club_code)
        .bind(club_name)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    async fn insert_student(&self, club_id: i64, student: &NewStudent) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO students
                (club_id, student_external_id, student_name, grade_class, seat_number)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(club_id)
        .bind(&student.student_external_id)
        .bind(&student.student_name)
        .bind(&student.grade_class)
        .bind(&student.seat_number)
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn clear_semester(&self, semester_id: i64) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "DELETE FROM students WHERE club_id IN (SELECT id FROM clubs WHERE semester_id = ?1)",
        )
        .bind(semester_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM clubs WHERE semester_id = ?1")
            .bind(semester_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn touch_semester(&self, semester_id: i64) -> Result<(), AppError> {
        let updated = sqlx::query("UPDATE semesters SET last_updated = ?1 WHERE id = ?2")
            .bind(now())
            .bind(semester_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn search_students(
        &self,
        name: &str,
        semester_id: Option<i64>,
        grade_class: Option<&str>,
    ) -> Result<Vec<EnrollmentRow>, AppError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT
                s.semester_key,
                c.class_group_id,
                c.club_code,
                c.club_name,
                st.student_external_id,
                st.student_name,
                st.grade_class,
                st.seat_number
            FROM students st
            JOIN clubs c ON st.club_id = c.id
            JOIN semesters s ON c.semester_id = s.id
            WHERE st.student_name = ?1
              AND (?2 IS NULL OR c.semester_id = ?2)
              AND (?3 IS NULL OR st.grade_class = ?3)
            ORDER BY
                s.academic_year DESC,
                CASE s.term WHEN '下' THEN 1 ELSE 0 END DESC,
                c.class_group_id ASC,
                st.id ASC
            "#,
        )
        .bind(name)
        .bind(semester_id)
        .bind(grade_class)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn list_semesters(&self) -> Result<Vec<Semester>, AppError> {
        // The second term of a year is newer than its first term.
        let semesters = sqlx::query_as::<_, Semester>(
            r#"
            SELECT id, semester_key, academic_year, term, last_updated, source_date
            FROM semesters
            ORDER BY academic_year DESC, CASE term WHEN '下' THEN 1 ELSE 0 END DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(semesters)
    }
}
