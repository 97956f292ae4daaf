pub mod ids;
pub mod models;
mod queries;
mod sqlite;

pub use ids::{IdGenerator, RandomIds, SequentialIds};
pub use models::{Owner, OwnerId, Record, RecordId, ScanCandidate, TimestampSource};
pub use sqlite::Database;

use crate::error::Error;

/// Persisted catalog of records.
pub trait RecordStore: Send + Sync {
    fn records_for_owner(&self, owner: OwnerId) -> Result<Vec<Record>, Error>;

    /// Records with this file name, regardless of owner or folder.
    fn records_named(&self, name: &str) -> Result<Vec<Record>, Error>;

    fn record(&self, id: RecordId) -> Result<Option<Record>, Error>;

    /// Inserts all records or none of them.
    fn insert_records(&self, records: &[Record]) -> Result<usize, Error>;

    /// Deletes all listed ids or none of them.
    fn delete_records(&self, ids: &[RecordId]) -> Result<usize, Error>;

    fn update_record(&self, record: &Record) -> Result<(), Error>;

    fn max_record_id(&self) -> Result<Option<RecordId>, Error>;
}

/// Maps logins to owners.
pub trait OwnerDirectory: Send + Sync {
    fn owners(&self) -> Result<Vec<Owner>, Error>;

    fn owner(&self, id: OwnerId) -> Result<Option<Owner>, Error>;

    fn owner_by_login(&self, login: &str) -> Result<Option<Owner>, Error>;

    fn add_owner(&self, login: &str, display_name: &str) -> Result<Owner, Error>;

    /// Returns false when no owner had that login.
    fn remove_owner(&self, login: &str) -> Result<bool, Error>;
}
