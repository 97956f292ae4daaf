use crate::config::AppConfig;
use crate::error::Error;
use crate::file_store::FileStore;
use crate::progress::ProgressReporter;
use crate::reconciler::{CatalogReconciler, ReconcileReport};
use crate::scanner::DirectoryScanner;
use crate::storage::{Database, OwnerDirectory, RecordStore, SequentialIds};
use crate::timestamp::TimestampResolver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub struct SyncEngine {
    config: AppConfig,
    db_path: String,
}

#[derive(Debug)]
pub struct SyncResult {
    pub duration: Duration,
    pub reports: Vec<ReconcileReport>,
    /// Owners whose scan could not run at all.
    pub failed_owners: Vec<(String, Error)>,
}

impl SyncResult {
    pub fn total_scanned(&self) -> usize {
        self.reports.iter().map(|r| r.scanned).sum()
    }

    pub fn total_inserted(&self) -> usize {
        self.reports.iter().map(|r| r.inserted).sum()
    }

    pub fn total_deleted(&self) -> usize {
        self.reports.iter().map(|r| r.deleted).sum()
    }

    pub fn total_fallbacks(&self) -> usize {
        self.reports.iter().map(|r| r.fallback_timestamps).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_owners.is_empty() && self.reports.iter().all(ReconcileReport::is_clean)
    }
}

impl SyncEngine {
    pub fn new(config: AppConfig) -> Self {
        let db_path = config.database_path.clone();
        Self { config, db_path }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Opens the catalog at the configured path and reconciles every owner.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<SyncResult, Error> {
        let db = Arc::new(Database::open(&self.db_path)?);
        self.run_with(db, reporter)
    }

    /// Reconciles every owner against an already opened catalog:
    /// 1. Load owners
    /// 2. For each owner, scan its folder and resolve timestamps
    /// 3. Insert new records, remove records whose file is gone
    pub fn run_with(
        &self,
        db: Arc<Database>,
        reporter: &dyn ProgressReporter,
    ) -> Result<SyncResult, Error> {
        let start = Instant::now();
        let reconciler = self.build_reconciler(Arc::clone(&db))?;

        let owners = db.owners()?;
        info!("Synchronizing {} owners", owners.len());
        reporter.on_sync_start(owners.len());

        let mut reports = Vec::with_capacity(owners.len());
        let mut failed_owners = Vec::new();
        for owner in owners {
            reporter.on_owner_start(&owner.login);
            match reconciler.reconcile_owner(&owner, reporter) {
                Ok(report) => {
                    debug!(
                        "{}: scan {:.2}s, reconcile {:.2}s",
                        report.login,
                        report.scan_duration.as_secs_f64(),
                        report.reconcile_duration.as_secs_f64()
                    );
                    reports.push(report);
                }
                Err(err) => {
                    error!("Failed synchronizing {}: {}", owner.login, err);
                    failed_owners.push((owner.login, err));
                }
            }
        }

        Ok(SyncResult {
            duration: start.elapsed(),
            reports,
            failed_owners,
        })
    }

    fn build_reconciler(&self, db: Arc<Database>) -> Result<CatalogReconciler, Error> {
        let scan = &self.config.scan;
        let files = FileStore::open(&self.config.storage_root)?;

        let mut resolver = TimestampResolver::new(scan);
        if scan.catalog_lookup {
            resolver = resolver.with_catalog(Arc::clone(&db) as Arc<dyn RecordStore>);
        }
        let scanner = DirectoryScanner::new(files, resolver, scan)?;
        let ids = SequentialIds::from_store(db.as_ref())?;

        Ok(CatalogReconciler::new(
            scanner,
            db,
            Arc::new(ids),
            scan.insert_batch_size,
        ))
    }
}
