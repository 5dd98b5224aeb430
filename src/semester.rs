//! Academic semester derivation.
//!
//! The portal never names its semester. It only publishes the date the
//! enrollment window opens, so the semester is inferred from that date:
//! January through June belong to the second term of the previous academic
//! year, July through December to the first term of the current one. Years
//! are counted in the ROC era (Gregorian year minus 1911).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;

const ROC_ERA_OFFSET: i32 = 1911;

/// Last Gregorian month that still belongs to the second term.
const SECOND_TERM_LAST_MONTH: u32 = 6;

static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})/(\d{1,2})").expect("static pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "上")]
    First,
    #[serde(rename = "下")]
    Second,
}

impl Term {
    pub fn glyph(self) -> &'static str {
        match self {
            Term::First => "上",
            Term::Second => "下",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

#[derive(Debug, Error)]
#[error("unknown term glyph: {0}")]
pub struct ParseTermError(String);

impl FromStr for Term {
    type Err = ParseTermError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "上" => Ok(Term::First),
            "下" => Ok(Term::Second),
            other => Err(ParseTermError(other.to_string())),
        }
    }
}

/// `(academic_year, term)` pair. Orders chronologically, so the newest
/// semester is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemesterKey {
    pub academic_year: i32,
    pub term: Term,
}

impl SemesterKey {
    pub fn new(academic_year: i32, term: Term) -> Self {
        Self { academic_year, term }
    }
}

/// Display key, e.g. `114下`.
impl fmt::Display for SemesterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.academic_year, self.term)
    }
}

/// Resolve an enrollment-window date string (`YYYY/M` or `YYYY/M/D`, possibly
/// embedded in surrounding text) to its semester.
pub fn resolve(date: &str) -> Result<SemesterKey, AppError> {
    let caps = YEAR_MONTH
        .captures(date)
        .ok_or_else(|| AppError::MalformedDate(date.to_string()))?;

    let year: i32 = caps[1]
        .parse()
        .map_err(|_| AppError::MalformedDate(date.to_string()))?;
    let month: u32 = caps[2]
        .parse()
        .map_err(|_| AppError::MalformedDate(date.to_string()))?;

    if !(1..=12).contains(&month) {
        return Err(AppError::MalformedDate(date.to_string()));
    }

    let roc_year = year - ROC_ERA_OFFSET;
    let key = if month <= SECOND_TERM_LAST_MONTH {
        SemesterKey::new(roc_year - 1, Term::Second)
    } else {
        SemesterKey::new(roc_year, Term::First)
    };

    Ok(key)
}
