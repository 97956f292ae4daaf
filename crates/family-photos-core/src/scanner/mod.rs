pub mod dispatch;

pub use dispatch::{TaskOutcome, WorkerPool};

use crate::config::ScanConfig;
use crate::error::Error;
use crate::file_store::{FileStore, StoredFile};
use crate::progress::ProgressReporter;
use crate::storage::{Owner, OwnerId, ScanCandidate, TimestampSource};
use crate::timestamp::{Resolved, TimestampResolver};
use glob::Pattern;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Files directly in the owner folder have no folder, files one level down
/// belong to that folder. Nothing deeper is cataloged.
pub const SCAN_DEPTH: usize = 2;

const SIDECAR_EXTENSION: &str = "json";

/// Walks owner folders and resolves a creation time for every eligible file.
pub struct DirectoryScanner {
    files: FileStore,
    resolver: Arc<TimestampResolver>,
    pool: WorkerPool,
    ignore: Vec<Pattern>,
}

impl DirectoryScanner {
    pub fn new(
        files: FileStore,
        resolver: TimestampResolver,
        config: &ScanConfig,
    ) -> Result<Self, Error> {
        let pool = WorkerPool::new(config.workers, config.resolve_timeout())?;
        debug!(
            "Scanner using {} workers, {:?} per file",
            pool.workers(),
            pool.timeout()
        );
        Ok(Self {
            files,
            resolver: Arc::new(resolver),
            pool,
            ignore: compile_patterns(&config.ignore_patterns),
        })
    }

    pub fn file_store(&self) -> &FileStore {
        &self.files
    }

    pub fn resolver(&self) -> &TimestampResolver {
        &self.resolver
    }

    /// One candidate per eligible file under the owner's folder, which is
    /// created if it does not exist yet.
    pub fn scan_owner(
        &self,
        owner: &Owner,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<ScanCandidate>, Error> {
        Owner::validate_login(&owner.login)?;
        let start = Instant::now();

        let owner_dir = self.files.ensure_dir(&owner.login)?;
        let eligible: Vec<StoredFile> = self
            .files
            .enumerate(&owner.login, SCAN_DEPTH)?
            .into_iter()
            .filter(|file| self.is_eligible(file, &owner_dir))
            .collect();

        info!(
            "Resolving timestamps for {} files of {}",
            eligible.len(),
            owner.login
        );
        reporter.on_scan_start(&owner.login, eligible.len());

        let paths: Vec<PathBuf> = eligible.iter().map(|f| f.path.clone()).collect();
        let resolver = Arc::clone(&self.resolver);
        let outcomes = self.pool.run(
            paths,
            move |path: &PathBuf, deadline| resolver.infer(path, Some(deadline)),
            &|done, total| reporter.on_scan_progress(done, total),
        );

        let candidates: Vec<ScanCandidate> = eligible
            .into_iter()
            .zip(outcomes)
            .map(|(file, outcome)| candidate(owner.id, file, outcome))
            .collect();

        let fallbacks = candidates
            .iter()
            .filter(|c| c.source == TimestampSource::WallClock)
            .count();
        if fallbacks > 0 {
            warn!(
                "{} of {} files of {} got the current time as creation time",
                fallbacks,
                candidates.len(),
                owner.login
            );
        }

        reporter.on_scan_complete(&owner.login, candidates.len(), start.elapsed().as_secs_f64());
        Ok(candidates)
    }

    fn is_eligible(&self, file: &StoredFile, owner_dir: &Path) -> bool {
        let is_sidecar = Path::new(&file.file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SIDECAR_EXTENSION));
        if is_sidecar {
            return false;
        }

        let relative = file.path.strip_prefix(owner_dir).unwrap_or(&file.path);
        let ignored = self
            .ignore
            .iter()
            .any(|p| p.matches(&file.file_name) || p.matches_path(relative));
        if ignored {
            debug!("Ignoring {}", file.path.display());
        }
        !ignored
    }
}

/// One candidate per scanned file, whatever its worker reported.
fn candidate(
    owner: OwnerId,
    file: StoredFile,
    outcome: TaskOutcome<Option<Resolved>>,
) -> ScanCandidate {
    let resolved = settle(&file.path, outcome);
    ScanCandidate {
        owner,
        folder: if file.depth == SCAN_DEPTH {
            file.parent_name()
        } else {
            None
        },
        file_size: i64::try_from(file.size).unwrap_or(i64::MAX),
        name: file.file_name,
        created_at: resolved.millis,
        source: resolved.source,
    }
}

fn settle(path: &Path, outcome: TaskOutcome<Option<Resolved>>) -> Resolved {
    match outcome {
        TaskOutcome::Completed(Some(resolved)) => resolved,
        TaskOutcome::Completed(None) => {
            warn!("No timestamp source for {}, using current time", path.display());
            Resolved::wall_clock()
        }
        TaskOutcome::TimedOut => {
            warn!("Timestamp resolution timed out for {}", path.display());
            Resolved::wall_clock()
        }
        TaskOutcome::Failed(message) => {
            error!("Timestamp resolution failed for {}: {}", path.display(), message);
            Resolved::wall_clock()
        }
    }
}

fn compile_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}
