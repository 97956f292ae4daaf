use colored::*;
use family_photos_core::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars, one bar per owner
/// scan.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        // A poisoned bar is still a usable bar.
        self.bar.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_sync_start(&self, owners: usize) {
        eprintln!("Synchronizing {} owners", owners.to_string().cyan());
    }

    fn on_owner_start(&self, login: &str) {
        eprintln!("{}", login.bold());
    }

    fn on_scan_start(&self, _login: &str, total_files: usize) {
        let pb = ProgressBar::new(total_files as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "  {spinner:.cyan} Resolving [{bar:30.cyan/dim}] {pos}/{len} files ({eta} remaining)",
        ) {
            pb.set_style(style.progress_chars("━╸─").tick_chars(TICK_CHARS));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_scan_progress(&self, files_resolved: usize, total_files: usize) {
        if let Some(pb) = self.bar().as_ref() {
            if pb.length() != Some(total_files as u64) {
                pb.set_length(total_files as u64);
            }
            pb.set_position(files_resolved as u64);
        }
    }

    fn on_scan_complete(&self, _login: &str, candidates: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  {} Scan complete: {} files in {:.2}s",
            "✓".green(),
            candidates,
            duration_secs
        );
    }

    fn on_reconcile_complete(&self, _login: &str, inserted: usize, deleted: usize, duration_secs: f64) {
        eprintln!(
            "  {} Catalog updated: {} added, {} removed in {:.2}s",
            "✓".green(),
            inserted,
            deleted,
            duration_secs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_without_a_bar_is_ignored() {
        let reporter = CliReporter::default();
        reporter.on_scan_progress(1, 2);
        assert!(reporter.bar().is_none());

        reporter.on_scan_start("alice", 2);
        reporter.on_scan_progress(2, 3);
        assert_eq!(reporter.bar().as_ref().and_then(|pb| pb.length()), Some(3));
        reporter.on_scan_complete("alice", 3, 0.1);
        assert!(reporter.bar().is_none());
    }
}
