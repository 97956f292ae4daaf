/// Trait for reporting sync progress.
///
/// The CLI implements it with indicatif bars. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_sync_start(&self, _owners: usize) {}
    fn on_owner_start(&self, _login: &str) {}
    fn on_scan_start(&self, _login: &str, _total_files: usize) {}
    fn on_scan_progress(&self, _files_resolved: usize, _total_files: usize) {}
    fn on_scan_complete(&self, _login: &str, _candidates: usize, _duration_secs: f64) {}
    fn on_reconcile_complete(
        &self,
        _login: &str,
        _inserted: usize,
        _deleted: usize,
        _duration_secs: f64,
    ) {
    }
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
