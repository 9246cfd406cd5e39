//! Folder-Name Dates
//!
//! Folders are named after the event they hold, usually starting with a
//! date: `2021`, `2021-07 Holiday`, `2021_07_15 Wedding`, `20210715`.
//! [`DateSpec::parse`] extracts that date and
//! [`derive_corrected_timestamp`] moves a file timestamp into it.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static FOLDER_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})(?:[-_]?(\d{2})(?:[-_]?(\d{2}))?)?").expect("folder date pattern is valid")
});

/// Date encoded in a folder name. Missing components are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpec {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl DateSpec {
    /// Parse the first `YYYY[-_MM[-_DD]]` run in `folder_name`.
    ///
    /// An out-of-range month drops both month and day; an out-of-range day
    /// drops the day only.
    pub fn parse(folder_name: &str) -> Option<Self> {
        let caps = FOLDER_DATE.captures(folder_name)?;
        let year = caps.get(1)?.as_str().parse().ok()?;

        let month = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m));
        let day = month.and_then(|_| {
            caps.get(3)
                .and_then(|d| d.as_str().parse::<u32>().ok())
                .filter(|d| (1..=31).contains(d))
        });

        Some(Self { year, month, day })
    }
}

/// Rewrite the date part of `original` to agree with `spec`.
///
/// The year is always taken from `spec`; month and day only when present.
/// If the result is not a real calendar date the day becomes 1. Time of day
/// is kept.
pub fn derive_corrected_timestamp(original: NaiveDateTime, spec: &DateSpec) -> NaiveDateTime {
    let date = original.date();
    let year = spec.year;
    let month = spec.month.unwrap_or(date.month());
    let day = spec.day.unwrap_or(date.day());

    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
        .map(|d| d.and_time(original.time()))
        .unwrap_or(original)
}
