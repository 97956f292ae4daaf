pub mod config;
pub mod engine;
pub mod error;
pub mod file_store;
pub mod hasher;
pub mod library;
pub mod progress;
pub mod reconciler;
pub mod scanner;
pub mod storage;
pub mod timestamp;

pub use config::{AppConfig, LogRotation, LoggingConfig, ScanConfig, TimestampUnit};
pub use engine::{SyncEngine, SyncResult};
pub use error::Error;
pub use file_store::{DeleteOutcome, FileStore, StoredFile};
pub use hasher::{Download, ETagCache};
pub use library::{MediaLibrary, Upload};
pub use progress::{ProgressReporter, SilentReporter};
pub use reconciler::{CatalogReconciler, ReconcileReport};
pub use scanner::{DirectoryScanner, TaskOutcome, WorkerPool};
pub use timestamp::camera::ExifField;
pub use timestamp::{Resolved, TimestampResolver};
