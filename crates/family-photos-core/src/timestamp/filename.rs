//! Creation times encoded in file names by cameras and messaging apps.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

/// Date-only names outside this year range are treated as non-matches.
const DATE_ONLY_YEARS: std::ops::RangeInclusive<i32> = 2000..=2050;

lazy_static! {
    // IMG_20160922_160430, VID-20160922-WA160430
    static ref DATE_HOUR_PATTERN: Regex = Regex::new(r"(\d{8})\D*(\d{6})").unwrap();
    // Screenshot_2016-09-22-16-04-30
    static ref SEPARATED_DATE_HOUR_PATTERN: Regex = Regex::new(
        r"(\d{4})[-_.](\d{2})[-_.](\d{2})\D{1,3}(\d{2})[-_.:]?(\d{2})[-_.:]?(\d{2})"
    )
    .unwrap();
    static ref MILLIS_PATTERN: Regex = Regex::new(r"(?:^|\D)(\d{13})(?:\D|$)").unwrap();
    static ref DATE_PATTERN: Regex = Regex::new(r"(?:^|\D)(\d{8})(?:\D|$)").unwrap();
}

/// Epoch milliseconds parsed from the extension-less file name, read as UTC.
pub fn filename_millis(path: &Path) -> Option<i64> {
    let stem = path.file_stem()?.to_string_lossy();
    parse_name(&stem)
}

fn parse_name(name: &str) -> Option<i64> {
    if let Some(millis) = DATE_HOUR_PATTERN
        .captures(name)
        .and_then(|caps| date_time(&caps[1], &caps[2]))
    {
        return Some(millis);
    }

    if let Some(millis) = SEPARATED_DATE_HOUR_PATTERN
        .captures(name)
        .and_then(|caps| separated_date_time(&caps))
    {
        return Some(millis);
    }

    if let Some(millis) = MILLIS_PATTERN
        .captures(name)
        .and_then(|caps| caps[1].parse::<i64>().ok())
    {
        return Some(millis);
    }

    DATE_PATTERN.captures(name).and_then(|caps| {
        let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
        if !DATE_ONLY_YEARS.contains(&date.year()) {
            return None;
        }
        date.and_hms_opt(0, 0, 0).map(to_millis)
    })
}

fn date_time(date: &str, time: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y%m%d %H%M%S")
        .ok()
        .map(to_millis)
}

fn separated_date_time(caps: &Captures) -> Option<i64> {
    let joined = format!(
        "{}{}{} {}{}{}",
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6]
    );
    NaiveDateTime::parse_from_str(&joined, "%Y%m%d %H%M%S")
        .ok()
        .map(to_millis)
}

fn to_millis(date_time: NaiveDateTime) -> i64 {
    date_time.and_utc().timestamp_millis()
}
