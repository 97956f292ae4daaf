//! Creation-time inference.
//!
//! Strategies are tried in order and the first hit wins:
//! 1. sidecar `.json` metadata
//! 2. date/time or epoch millis embedded in the file name
//! 3. EXIF capture time of images
//! 4. filesystem creation/modification times
//! 5. the stored time of an already cataloged file with the same name
//!
//! [`TimestampResolver::resolve`] adds the wall clock as a last resort, so a
//! file always gets a positive creation time.

pub mod attributes;
pub mod camera;
pub mod filename;
pub mod sidecar;

use crate::config::{ScanConfig, TimestampUnit};
use crate::storage::{RecordStore, TimestampSource};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub millis: i64,
    pub source: TimestampSource,
}

impl Resolved {
    pub fn wall_clock() -> Self {
        Self {
            millis: Utc::now().timestamp_millis(),
            source: TimestampSource::WallClock,
        }
    }
}

pub struct TimestampResolver {
    sidecar_unit: TimestampUnit,
    exif_times: bool,
    filesystem_times: bool,
    catalog: Option<Arc<dyn RecordStore>>,
}

impl TimestampResolver {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            sidecar_unit: config.sidecar_timestamp_unit,
            exif_times: config.exif_times,
            filesystem_times: config.filesystem_times,
            catalog: None,
        }
    }

    /// Enables the lookup of same-named records as the last strategy.
    pub fn with_catalog(mut self, catalog: Arc<dyn RecordStore>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Runs the strategies in order. Stops once `deadline` has passed; a
    /// result produced after the deadline is discarded.
    pub fn infer(&self, path: &Path, deadline: Option<Instant>) -> Option<Resolved> {
        let expired = || deadline.is_some_and(|d| Instant::now() >= d);

        let strategies: [(TimestampSource, &dyn Fn() -> Option<i64>); 5] = [
            (TimestampSource::Sidecar, &|| {
                sidecar::sidecar_millis(path, self.sidecar_unit)
            }),
            (TimestampSource::FileName, &|| filename::filename_millis(path)),
            (TimestampSource::Exif, &|| {
                self.exif_times.then(|| camera::exif_millis(path)).flatten()
            }),
            (TimestampSource::FileSystem, &|| {
                if self.filesystem_times {
                    attributes::filesystem_millis(path)
                } else {
                    None
                }
            }),
            (TimestampSource::Catalog, &|| self.catalog_millis(path)),
        ];

        for (source, strategy) in strategies {
            if expired() {
                debug!("Deadline passed before {:?} for {}", source, path.display());
                return None;
            }
            if let Some(millis) = strategy().filter(|millis| *millis > 0) {
                if expired() {
                    debug!("Discarding late {:?} result for {}", source, path.display());
                    return None;
                }
                return Some(Resolved { millis, source });
            }
        }
        None
    }

    /// Like [`infer`](Self::infer) without a deadline, falling back to the wall clock.
    pub fn resolve(&self, path: &Path) -> Resolved {
        self.infer(path, None).unwrap_or_else(|| {
            warn!("No timestamp for {}, using current time", path.display());
            Resolved::wall_clock()
        })
    }

    fn catalog_millis(&self, path: &Path) -> Option<i64> {
        let catalog = self.catalog.as_ref()?;
        let name = path.file_name()?.to_str()?;
        match catalog.records_named(name) {
            Ok(records) => records.iter().map(|r| r.created_at).filter(|t| *t > 0).min(),
            Err(err) => {
                debug!("Catalog lookup for {} failed: {}", name, err);
                None
            }
        }
    }
}
