//! Extraction of roster data from portal pages.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::AppError;
use crate::source::RawStudentRow;

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}/\d{1,2}/\d{1,2})").expect("static pattern"));
static CLUB_CODE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"編號\s*(\d+-\d+)").expect("static pattern"));

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("static selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("static selector"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3, p").expect("static selector"));

const HEADER_MARKER: &str = "序號";

/// Decode a Big5 portal page.
pub fn decode_big5(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::BIG5.decode(bytes);
    if had_errors {
        tracing::debug!("Page contained bytes outside Big5; replaced");
    }
    text.into_owned()
}

/// First `YYYY/M/D` date anywhere in the page.
pub fn find_enrollment_date(page: &str) -> Option<String> {
    FULL_DATE.captures(page).map(|caps| caps[1].to_string())
}

/// Club code to name, from the two leading cells of each table row.
pub fn parse_club_directory(page: &str) -> HashMap<String, String> {
    let document = Html::parse_document(page);
    let mut directory = HashMap::new();

    for row in document.select(&ROW) {
        let cells: Vec<String> = row.select(&CELL).map(cell_text).collect();
        if cells.len() < 2 {
            continue;
        }

        let code = &cells[0];
        let starts_with_digit = code.chars().next().is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit && code.contains('-') {
            directory.insert(code.clone(), cells[1].clone());
        }
    }

    directory
}

/// Student rows of one class-group page.
///
/// Columns are: sequence, student number, grade/class, seat, name. A page
/// with students but no `編號 N-M` label cannot be attributed to a club and
/// is rejected.
pub fn parse_group_roster(page: &str) -> Result<Vec<RawStudentRow>, AppError> {
    let document = Html::parse_document(page);

    let club_code = document
        .select(&HEADING)
        .map(cell_text)
        .filter(|text| text.contains("編號") && text.contains('-'))
        .find_map(|text| CLUB_CODE_LABEL.captures(&text).map(|caps| caps[1].to_string()));

    let mut entries = Vec::new();
    for row in document.select(&ROW) {
        let cells: Vec<String> = row.select(&CELL).map(cell_text).collect();
        if cells.len() < 5 || cells[0] == HEADER_MARKER {
            continue;
        }

        let student_id = &cells[1];
        let name = &cells[4];
        if name.is_empty() || student_id.is_empty() {
            continue;
        }

        entries.push((student_id.clone(), cells[2].clone(), cells[3].clone(), name.clone()));
    }

    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let club_code = club_code.ok_or_else(|| {
        AppError::SourceUnavailable(format!(
            "roster page lists {} students but no club code",
            entries.len()
        ))
    })?;

    Ok(entries
        .into_iter()
        .map(|(student_id, grade, seat, name)| RawStudentRow {
            student_external_id: Some(student_id),
            name,
            grade_class: non_empty(grade),
            seat_number: non_empty(seat),
            club_code: club_code.clone(),
        })
        .collect())
}

fn cell_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}
