use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// 1980-01-01T00:00:00Z. Anything older is what filesystems report when they
/// don't track the attribute at all.
const MIN_PLAUSIBLE_MILLIS: i64 = 315_532_800_000;

/// Earliest plausible of the OS-reported creation and modification times.
pub fn filesystem_millis(path: &Path) -> Option<i64> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!("No metadata for {}: {}", path.display(), err);
            return None;
        }
    };

    [metadata.created().ok(), metadata.modified().ok()]
        .into_iter()
        .flatten()
        .filter_map(system_time_millis)
        .filter(|millis| *millis >= MIN_PLAUSIBLE_MILLIS)
        .min()
}

fn system_time_millis(time: SystemTime) -> Option<i64> {
    let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::tempdir;

    #[test]
    fn test_old_modified_time_wins_over_recent_creation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.tif");
        fs::write(&path, b"tiff").unwrap();
        let stamped = FileTime::from_unix_time(1_300_000_000, 0);
        filetime::set_file_mtime(&path, stamped).unwrap();

        assert_eq!(filesystem_millis(&path), Some(1_300_000_000_000));
    }

    #[test]
    fn test_epoch_near_times_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.jpg");
        fs::write(&path, b"jpeg").unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(0, 0)).unwrap();

        // Only the creation time (if the platform reports one) can survive.
        if let Some(millis) = filesystem_millis(&path) {
            assert!(millis >= MIN_PLAUSIBLE_MILLIS);
        }
    }

    #[test]
    fn test_missing_file_has_no_attributes() {
        let dir = tempdir().unwrap();
        assert_eq!(filesystem_millis(&dir.path().join("gone.jpg")), None);
    }
}
