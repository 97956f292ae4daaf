use crate::error::Error;
use crate::file_store::FileStore;
use crate::progress::ProgressReporter;
use crate::scanner::DirectoryScanner;
use crate::storage::{IdGenerator, Owner, Record, RecordId, RecordStore, TimestampSource};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What one reconciliation pass changed for one owner.
#[derive(Debug)]
pub struct ReconcileReport {
    pub login: String,
    pub scanned: usize,
    pub inserted: usize,
    pub deleted: usize,
    /// Candidates that fell back to the wall clock.
    pub fallback_timestamps: usize,
    /// Records kept because their file could not be checked.
    pub unverified: usize,
    /// First failure of the insert phase. Batches after it were still tried.
    pub insert_error: Option<Error>,
    pub delete_error: Option<Error>,
    pub scan_duration: Duration,
    pub reconcile_duration: Duration,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.insert_error.is_none() && self.delete_error.is_none()
    }
}

/// Converges an owner's catalog with what is on disk.
///
/// New files get a record, records whose file is gone are removed, and
/// records present on both sides are never touched. Running it twice in a
/// row changes nothing the second time.
pub struct CatalogReconciler {
    scanner: DirectoryScanner,
    store: Arc<dyn RecordStore>,
    ids: Arc<dyn IdGenerator>,
    batch_size: usize,
}

impl CatalogReconciler {
    pub fn new(
        scanner: DirectoryScanner,
        store: Arc<dyn RecordStore>,
        ids: Arc<dyn IdGenerator>,
        batch_size: usize,
    ) -> Self {
        Self {
            scanner,
            store,
            ids,
            batch_size: batch_size.max(1),
        }
    }

    pub fn scanner(&self) -> &DirectoryScanner {
        &self.scanner
    }

    fn files(&self) -> &FileStore {
        self.scanner.file_store()
    }

    /// Scanning or loading the persisted records failing is an error; the
    /// insert and delete phases report their failures in the result instead.
    pub fn reconcile_owner(
        &self,
        owner: &Owner,
        reporter: &dyn ProgressReporter,
    ) -> Result<ReconcileReport, Error> {
        let scan_start = Instant::now();
        let candidates = self.scanner.scan_owner(owner, reporter)?;
        let scan_duration = scan_start.elapsed();

        let reconcile_start = Instant::now();
        let persisted = self.store.records_for_owner(owner.id)?;
        let persisted_names: HashSet<String> = persisted.iter().map(Record::full_name).collect();

        let scanned = candidates.len();
        let fallback_timestamps = candidates
            .iter()
            .filter(|c| c.source == TimestampSource::WallClock)
            .count();

        let mut seen = HashSet::new();
        let to_insert: Vec<Record> = candidates
            .into_iter()
            .filter(|c| {
                let name = c.full_name();
                !persisted_names.contains(&name) && seen.insert(name)
            })
            .map(|c| c.into_record(self.ids.next_id()))
            .collect();
        debug!(
            "{}: {} scanned, {} persisted, {} new",
            owner.login,
            scanned,
            persisted.len(),
            to_insert.len()
        );
        let (inserted, insert_error) = self.insert_in_batches(&owner.login, &to_insert);

        let (orphans, unverified) = self.find_orphans(owner, &persisted);
        let (deleted, delete_error) = match self.store.delete_records(&orphans) {
            Ok(count) => (count, None),
            Err(err) => {
                error!(
                    "Failed removing {} stale records of {}: {}",
                    orphans.len(),
                    owner.login,
                    err
                );
                (0, Some(err))
            }
        };

        let reconcile_duration = reconcile_start.elapsed();
        info!(
            "Reconciled {}: {} inserted, {} deleted in {:.2}s",
            owner.login,
            inserted,
            deleted,
            reconcile_duration.as_secs_f64()
        );
        reporter.on_reconcile_complete(
            &owner.login,
            inserted,
            deleted,
            reconcile_duration.as_secs_f64(),
        );

        Ok(ReconcileReport {
            login: owner.login.clone(),
            scanned,
            inserted,
            deleted,
            fallback_timestamps,
            unverified,
            insert_error,
            delete_error,
            scan_duration,
            reconcile_duration,
        })
    }

    /// Each batch is its own transaction; a failed batch does not stop the
    /// ones after it.
    fn insert_in_batches(&self, login: &str, records: &[Record]) -> (usize, Option<Error>) {
        let mut inserted = 0;
        let mut first_error = None;
        for batch in records.chunks(self.batch_size) {
            match self.store.insert_records(batch) {
                Ok(count) => inserted += count,
                Err(err) => {
                    error!(
                        "Failed inserting batch of {} records for {}: {}",
                        batch.len(),
                        login,
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }
        (inserted, first_error)
    }

    /// Records whose file is confirmed absent. A failed existence check is
    /// not a confirmation.
    fn find_orphans(&self, owner: &Owner, persisted: &[Record]) -> (Vec<RecordId>, usize) {
        let mut orphans = Vec::new();
        let mut unverified = 0;
        for record in persisted {
            let exists = record
                .relative_path(owner)
                .and_then(|path| self.files().exists(path));
            match exists {
                Ok(true) => {}
                Ok(false) => {
                    debug!("{} of {} is gone", record.full_name(), owner.login);
                    orphans.push(record.id);
                }
                Err(err) => {
                    warn!(
                        "Keeping {} of {}, could not check its file: {}",
                        record.full_name(),
                        owner.login,
                        err
                    );
                    unverified += 1;
                }
            }
        }
        (orphans, unverified)
    }
}
