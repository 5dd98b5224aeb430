//! Roster store over a remote whole-table API.
//!
//! The remote side has no transactions, locks or auto-increment. Every
//! mutation re-reads the table it touches, edits it in memory, assigns
//! `max(id) + 1` to new rows and writes the full table back. Concurrent
//! writers race and the last write wins, so one process must own the store.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AppError;
use crate::models::{Club, EnrollmentRow, NewStudent, Semester, Student};
use crate::semester;
use crate::store::table::{CLUBS, SEMESTERS, STUDENTS, TableClient};
use crate::store::{RosterStore, now};

pub struct RemoteRosterStore<C> {
    client: C,
}

impl<C: TableClient> RemoteRosterStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn load<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, AppError> {
        self.client
            .read_table(table)
            .await?
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| {
                    AppError::StoreUnavailable(format!("Malformed row in {}: {}", table, e))
                })
            })
            .collect()
    }

    async fn save<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), AppError> {
        let rows = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|e| AppError::StoreUnavailable(format!("Failed to encode {}: {}", table, e)))?;

        self.client.write_table(table, rows).await
    }
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().map_or(1, |max| max + 1)
}

#[async_trait]
impl<C: TableClient> RosterStore for RemoteRosterStore<C> {
    fn backend(&self) -> &'static str {
        "remote"
    }

    async fn get_or_create_semester(&self, date: &str) -> Result<i64, AppError> {
        let key = semester::resolve(date)?;
        let semester_key = key.to_string();

        let mut semesters: Vec<Semester> = self.load(SEMESTERS).await?;
        if let Some(existing) = semesters.iter().find(|s| s.semester_key == semester_key) {
            return Ok(existing.id);
        }

        let id = next_id(semesters.iter().map(|s| s.id));
        semesters.push(Semester {
            id,
            semester_key,
            academic_year: key.academic_year,
            term: key.term,
            last_updated: now(),
            source_date: date.to_string(),
        });
        self.save(SEMESTERS, &semesters).await?;

        Ok(id)
    }

    async fn is_cached(&self, semester_id: i64) -> Result<bool, AppError> {
        let clubs: Vec<Club> = self.load(CLUBS).await?;
        Ok(clubs.iter().any(|c| c.semester_id == semester_id))
    }

    async fn upsert_club(
        &self,
        semester_id: i64,
        class_group_id: i64,
        club_code: &str,
        club_name: &str,
    ) -> Result<i64, AppError> {
        let mut clubs: Vec<Club> = self.load(CLUBS).await?;

        let slot = clubs
            .iter_mut()
            .find(|c| c.semester_id == semester_id && c.class_group_id == class_group_id);

        let id = match slot {
            Some(club) => {
                club.club_code = club_code.to_string();
                club.club_name = club_name.to_string();
                club.id
            }
            None => {
                let id = next_id(clubs.iter().map(|c| c.id));
                clubs.push(Club {
                    id,
                    semester_id,
                    class_group_id,
                    club_code: club_code.to_string(),
                    club_name: club_name.to_string(),
                });
                id
            }
        };

        self.save(CLUBS, &clubs).await?;
        Ok(id)
    }

    async fn insert_student(&self, club_id: i64, student: &NewStudent) -> Result<i64, AppError> {
        let mut students: Vec<Student> = self.load(STUDENTS).await?;

        let id = next_id(students.iter().map(|s| s.id));
        students.push(Student {
            id,
            club_id,
            student_external_id: student.student_external_id.clone(),
            student_name: student.student_name.clone(),
            grade_class: student.grade_class.clone(),
            seat_number: student.seat_number.clone(),
        });
        self.save(STUDENTS, &students).await?;

        Ok(id)
    }

    async fn clear_semester(&self, semester_id: i64) -> Result<(), AppError> {
        let clubs: Vec<Club> = self.load(CLUBS).await?;
        let doomed: Vec<i64> = clubs
            .iter()
            .filter(|c| c.semester_id == semester_id)
            .map(|c| c.id)
            .collect();

        if doomed.is_empty() {
            return Ok(());
        }

        // Students first, so no student is ever left pointing at a missing club.
        let mut students: Vec<Student> = self.load(STUDENTS).await?;
        let before = students.len();
        students.retain(|s| !doomed.contains(&s.club_id));
        if students.len() != before {
            self.save(STUDENTS, &students).await?;
        }

        // Re-read: the student write may have taken long enough for another writer.
        let mut clubs: Vec<Club> = self.load(CLUBS).await?;
        clubs.retain(|c| c.semester_id != semester_id);
        self.save(CLUBS, &clubs).await
    }

    async fn touch_semester(&self, semester_id: i64) -> Result<(), AppError> {
        let mut semesters: Vec<Semester> = self.load(SEMESTERS).await?;
        let semester = semesters
            .iter_mut()
            .find(|s| s.id == semester_id)
            .ok_or(AppError::NotFound)?;

        semester.last_updated = now();
        self.save(SEMESTERS, &semesters).await
    }

    async fn search_students(
        &self,
        name: &str,
        semester_id: Option<i64>,
        grade_class: Option<&str>,
    ) -> Result<Vec<EnrollmentRow>, AppError> {
        let students: Vec<Student> = self.load(STUDENTS).await?;
        let clubs: HashMap<i64, Club> = self
            .load::<Club>(CLUBS)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let semesters: HashMap<i64, Semester> = self
            .load::<Semester>(SEMESTERS)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut matches: Vec<(&Semester, &Club, &Student)> = students
            .iter()
            .filter(|s| s.student_name == name)
            .filter(|s| grade_class.is_none() || s.grade_class.as_deref() == grade_class)
            .filter_map(|s| {
                let club = clubs.get(&s.club_id)?;
                if semester_id.is_some_and(|id| club.semester_id != id) {
                    return None;
                }
                let semester = semesters.get(&club.semester_id)?;
                Some((semester, club, s))
            })
            .collect();

        matches.sort_by_key(|(semester, club, student)| {
            (Reverse(semester.key()), club.class_group_id, student.id)
        });

        Ok(matches
            .into_iter()
            .map(|(semester, club, student)| EnrollmentRow {
                semester_key: semester.semester_key.clone(),
                class_group_id: club.class_group_id,
                club_code: club.club_code.clone(),
                club_name: club.club_name.clone(),
                student_external_id: student.student_external_id.clone(),
                student_name: student.student_name.clone(),
                grade_class: student.grade_class.clone(),
                seat_number: student.seat_number.clone(),
            })
            .collect())
    }

    async fn list_semesters(&self) -> Result<Vec<Semester>, AppError> {
        let mut semesters: Vec<Semester> = self.load(SEMESTERS).await?;
        semesters.sort_by_key(|s| Reverse(s.key()));
        Ok(semesters)
    }
}
