#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use club_roster::error::AppError;
use club_roster::source::{RawStudentRow, RosterSource, SourceConnector};

/// What the fake portal serves.
#[derive(Default)]
pub struct Script {
    pub date: Option<String>,
    pub date_fails: bool,
    pub directory: HashMap<String, String>,
    pub directory_fails: bool,
    pub groups: HashMap<u32, Vec<RawStudentRow>>,
    pub failing_groups: HashSet<u32>,
}

#[derive(Clone)]
pub struct ScriptedPortal {
    script: Arc<Mutex<Script>>,
    sessions_opened: Arc<AtomicUsize>,
    group_requests: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedPortal {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            sessions_opened: Arc::new(AtomicUsize::new(0)),
            group_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change what later sessions will see.
    pub fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn take_group_requests(&self) -> Vec<u32> {
        std::mem::take(&mut *self.group_requests.lock().unwrap())
    }
}

#[async_trait]
impl SourceConnector for ScriptedPortal {
    async fn open_session(&self) -> Result<Box<dyn RosterSource>, AppError> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl RosterSource for ScriptedPortal {
    async fn fetch_enrollment_window_date(&self) -> Result<Option<String>, AppError> {
        let script = self.script.lock().unwrap();
        if script.date_fails {
            return Err(AppError::SourceUnavailable("portal timed out".to_string()));
        }
        Ok(script.date.clone())
    }

    async fn fetch_club_directory(&self) -> Result<HashMap<String, String>, AppError> {
        let script = self.script.lock().unwrap();
        if script.directory_fails {
            return Err(AppError::SourceUnavailable("main.asp returned 500".to_string()));
        }
        Ok(script.directory.clone())
    }

    async fn fetch_group_roster(&self, class_group_id: u32) -> Result<Vec<RawStudentRow>, AppError> {
        self.group_requests.lock().unwrap().push(class_group_id);

        let script = self.script.lock().unwrap();
        if script.failing_groups.contains(&class_group_id) {
            return Err(AppError::SourceUnavailable(format!(
                "list.asp?ClassID={} reset",
                class_group_id
            )));
        }
        Ok(script.groups.get(&class_group_id).cloned().unwrap_or_default())
    }
}

pub fn row(name: &str, student_id: &str, grade: &str, club_code: &str) -> RawStudentRow {
    RawStudentRow {
        student_external_id: Some(student_id.to_string()),
        name: name.to_string(),
        grade_class: Some(grade.to_string()),
        seat_number: Some("1".to_string()),
        club_code: club_code.to_string(),
    }
}

/// Groups 1..=3: two students in "1-7", nobody in group 2, one student in a
/// club the directory does not list.
pub fn three_group_script(date: &str) -> Script {
    Script {
        date: Some(date.to_string()),
        directory: HashMap::from([("1-7".to_string(), "直排輪".to_string())]),
        groups: HashMap::from([
            (
                1,
                vec![
                    row("王小明", "110234", "3年2班", "1-7"),
                    row("林怡君", "110567", "4年1班", "1-7"),
                ],
            ),
            (2, Vec::new()),
            (3, vec![row("陳大文", "110890", "5年3班", "3-2")]),
        ]),
        ..Script::default()
    }
}
