//! Companion `.json` metadata files, as written by Google Takeout exports.

use crate::config::TimestampUnit;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EDITED_SUFFIXES: &[&str] = &["-edited", "-editat"];

lazy_static! {
    static ref DUPLICATE_COUNTER: Regex = Regex::new(r"^(.*?)\s*(\(\d+\))$").unwrap();
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SidecarMetadata {
    creation_time: Option<TimeEntry>,
    photo_taken_time: Option<TimeEntry>,
}

#[derive(Deserialize)]
struct TimeEntry {
    timestamp: Option<RawTimestamp>,
}

/// Takeout writes timestamps as strings, other tools as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawTimestamp {
    fn value(&self) -> Option<i64> {
        match self {
            RawTimestamp::Integer(value) => Some(*value),
            RawTimestamp::Float(value) if value.is_finite() => Some(value.trunc() as i64),
            RawTimestamp::Float(_) => None,
            RawTimestamp::Text(text) => text.trim().parse().ok(),
        }
    }
}

/// Sidecar file names that may describe `path`, most specific first.
pub fn candidates(path: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(file_name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
    else {
        return Vec::new();
    };

    let mut names = vec![format!("{}.json", file_name)];

    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };

    let (base, counter) = match DUPLICATE_COUNTER.captures(stem) {
        Some(caps) => (
            caps.get(1).map_or(stem, |m| m.as_str()),
            caps.get(2).map(|m| m.as_str()),
        ),
        None => (stem, None),
    };
    let base = EDITED_SUFFIXES
        .iter()
        .find_map(|suffix| base.strip_suffix(suffix))
        .unwrap_or(base);

    if base != stem && !base.is_empty() {
        let original = match extension {
            Some(ext) => format!("{}.{}", base, ext),
            None => base.to_string(),
        };
        names.push(format!("{}.json", original));
        if let Some(counter) = counter {
            names.push(format!("{}{}.json", original, counter));
        }
    }

    names.dedup();
    names.into_iter().map(|name| dir.join(name)).collect()
}

/// Earliest of `creationTime.timestamp` and `photoTakenTime.timestamp` from
/// the first existing sidecar, in epoch milliseconds.
pub fn sidecar_millis(path: &Path, unit: TimestampUnit) -> Option<i64> {
    let sidecar = candidates(path).into_iter().find(|c| c.is_file())?;
    read_sidecar(&sidecar, unit)
}

pub fn read_sidecar(sidecar: &Path, unit: TimestampUnit) -> Option<i64> {
    let file = match File::open(sidecar) {
        Ok(file) => file,
        Err(err) => {
            debug!("Could not open sidecar {}: {}", sidecar.display(), err);
            return None;
        }
    };

    let metadata: SidecarMetadata = match serde_json::from_reader(BufReader::new(file)) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!("Failed parsing sidecar {}: {}", sidecar.display(), err);
            return None;
        }
    };

    [metadata.creation_time, metadata.photo_taken_time]
        .iter()
        .flatten()
        .filter_map(|entry| entry.timestamp.as_ref()?.value())
        .filter_map(|value| unit.to_millis(value))
        .filter(|millis| *millis > 0)
        .min()
}
