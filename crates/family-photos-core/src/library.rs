use crate::error::Error;
use crate::file_store::{DeleteOutcome, FileStore};
use crate::hasher::{Download, ETagCache};
use crate::storage::models::{full_name, relative_path, validate_component};
use crate::storage::{IdGenerator, Owner, OwnerDirectory, OwnerId, Record, RecordId, RecordStore};
use crate::timestamp::camera::{self, ExifField};
use chrono::Utc;
use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const MAX_NAME_ATTEMPTS: usize = 16;

/// Metadata sent along with uploaded bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Name as given by the client; only the last path segment is used.
    pub file_name: String,
    pub created_at: i64,
    pub folder: Option<String>,
}

/// Request-time operations on the catalog and the files behind it.
///
/// A record id that belongs to a different owner is reported as
/// [`Error::NotFound`], the same as an unknown id.
pub struct MediaLibrary {
    files: FileStore,
    records: Arc<dyn RecordStore>,
    owners: Arc<dyn OwnerDirectory>,
    ids: Arc<dyn IdGenerator>,
    etags: ETagCache,
}

impl MediaLibrary {
    pub fn new(
        files: FileStore,
        records: Arc<dyn RecordStore>,
        owners: Arc<dyn OwnerDirectory>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            files,
            records,
            owners,
            ids,
            etags: ETagCache::new(),
        }
    }

    pub fn etags(&self) -> &ETagCache {
        &self.etags
    }

    /// The owner's records, newest first.
    pub fn list(&self, owner: OwnerId) -> Result<Vec<Record>, Error> {
        self.owner(owner)?;
        let mut records = self.records.records_for_owner(owner)?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Streams `content` into the owner's folder and catalogs it. A name that
    /// is already taken gets a `-<millis>` suffix before its extension.
    pub fn upload<R: Read>(
        &self,
        owner: OwnerId,
        upload: Upload,
        content: &mut R,
    ) -> Result<Record, Error> {
        if upload.created_at <= 0 {
            return Err(Error::InvalidTimestamp(upload.created_at));
        }
        let owner = self.owner(owner)?;
        if let Some(folder) = &upload.folder {
            validate_component(folder)?;
        }
        let base_name = upload
            .file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        validate_component(&base_name)?;

        let folder = upload.folder.as_deref();
        let (name, relative, written) =
            self.claim_and_store(&owner, folder, &base_name, content)?;
        if let Err(err) = self.files.set_timestamps(&relative, upload.created_at) {
            warn!("Could not stamp {}: {}", relative.display(), err);
        }

        let record = Record {
            id: self.ids.next_id(),
            owner: owner.id,
            name,
            folder: upload.folder,
            created_at: upload.created_at,
            file_size: i64::try_from(written).unwrap_or(i64::MAX),
        };
        if let Err(err) = self.records.insert_records(std::slice::from_ref(&record)) {
            error!("Failed cataloging {}: {}", relative.display(), err);
            if let Err(cleanup) = self.files.delete(&relative) {
                warn!("Could not remove {}: {}", relative.display(), cleanup);
            }
            return Err(err);
        }

        info!("Saved {} for {}", record.full_name(), owner.login);
        Ok(record)
    }

    pub fn download(
        &self,
        owner: OwnerId,
        record: RecordId,
        if_none_match: Option<&str>,
    ) -> Result<Download, Error> {
        let (owner, record) = self.owned_record(owner, record)?;
        let path = self.files.resolve(record.relative_path(&owner)?)?;
        self.etags.respond(record.id, &path, if_none_match)
    }

    /// Primary-image EXIF fields of the record's file, empty when it has none.
    pub fn exif(&self, owner: OwnerId, record: RecordId) -> Result<Vec<ExifField>, Error> {
        let (owner, record) = self.owned_record(owner, record)?;
        let path = self.files.resolve(record.relative_path(&owner)?)?;
        if !path.is_file() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        Ok(camera::read_exif(&path).unwrap_or_default())
    }

    /// Removes the file, then the record. A file that is already gone is
    /// logged; any other failure keeps the record.
    pub fn delete(&self, owner: OwnerId, record: RecordId) -> Result<Record, Error> {
        let (owner, record) = self.owned_record(owner, record)?;
        let relative = record.relative_path(&owner)?;

        match self.files.delete(&relative)? {
            DeleteOutcome::Deleted => {}
            DeleteOutcome::Missing => {
                warn!("{} was already missing on disk", relative.display());
            }
        }
        self.records.delete_records(&[record.id])?;
        info!("Deleted {} of {}", record.full_name(), owner.login);
        Ok(record)
    }

    /// Moves a record, and its file, to another owner and/or folder.
    pub fn relocate(
        &self,
        owner: OwnerId,
        record: RecordId,
        target_owner: OwnerId,
        target_folder: Option<String>,
    ) -> Result<Record, Error> {
        let (owner, record) = self.owned_record(owner, record)?;
        let target = self.owner(target_owner)?;
        if let Some(folder) = &target_folder {
            validate_component(folder)?;
        }

        let from = record.relative_path(&owner)?;
        let to = relative_path(&target.login, target_folder.as_deref(), &record.name);
        if from == to {
            return Ok(record);
        }
        if self.name_taken(&target, target_folder.as_deref(), &record.name)? {
            return Err(Error::Conflict(format!(
                "{} already exists for {}",
                full_name(target_folder.as_deref(), &record.name),
                target.login
            )));
        }

        self.files.move_file(&from, &to)?;

        let moved = Record {
            owner: target.id,
            folder: target_folder,
            ..record
        };
        if let Err(err) = self.records.update_record(&moved) {
            error!("Failed updating record {}, moving file back: {}", moved.id, err);
            if let Err(rollback) = self.files.move_file(&to, &from) {
                error!(
                    "Could not move {} back to {}: {}",
                    to.display(),
                    from.display(),
                    rollback
                );
            }
            return Err(err);
        }

        info!(
            "Moved {} from {} to {}/{}",
            moved.name,
            owner.login,
            target.login,
            moved.full_name()
        );
        Ok(moved)
    }

    fn owner(&self, id: OwnerId) -> Result<Owner, Error> {
        self.owners
            .owner(id)?
            .ok_or_else(|| Error::NotFound(format!("Owner {}", id)))
    }

    fn owned_record(&self, owner: OwnerId, record: RecordId) -> Result<(Owner, Record), Error> {
        let owner = self.owner(owner)?;
        match self.records.record(record)? {
            Some(found) if found.owner == owner.id => Ok((owner, found)),
            _ => Err(Error::NotFound(format!("Record {}", record))),
        }
    }

    /// Taken in the catalog or on disk.
    fn name_taken(&self, owner: &Owner, folder: Option<&str>, name: &str) -> Result<bool, Error> {
        let wanted = full_name(folder, name);
        let cataloged = self
            .records
            .records_for_owner(owner.id)?
            .iter()
            .any(|r| r.full_name() == wanted);
        Ok(cataloged || self.files.exists(relative_path(&owner.login, folder, name))?)
    }

    /// Picks a free name and creates the file without replacing anything.
    /// Another upload can take the same name between the check and the
    /// write, so a refused create starts over with a fresh name.
    fn claim_and_store<R: Read>(
        &self,
        owner: &Owner,
        folder: Option<&str>,
        base_name: &str,
        content: &mut R,
    ) -> Result<(String, PathBuf, u64), Error> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = self.free_name(owner, folder, base_name)?;
            let relative = relative_path(&owner.login, folder, &name);
            match self.files.store_new_from(content, &relative) {
                Ok(written) => return Ok((name, relative, written)),
                Err(Error::Conflict(_)) => {
                    debug!(
                        "{} was taken while uploading, picking another name",
                        relative.display()
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(Error::Conflict(format!(
            "no free name for {} after {} attempts",
            base_name, MAX_NAME_ATTEMPTS
        )))
    }

    fn free_name(&self, owner: &Owner, folder: Option<&str>, base_name: &str) -> Result<String, Error> {
        let taken: HashSet<String> = self
            .records
            .records_for_owner(owner.id)?
            .iter()
            .map(Record::full_name)
            .collect();
        let is_free = |name: &str| -> Result<bool, Error> {
            Ok(!taken.contains(&full_name(folder, name))
                && !self.files.exists(relative_path(&owner.login, folder, name))?)
        };

        if is_free(base_name)? {
            return Ok(base_name.to_string());
        }
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let candidate = with_suffix(base_name, millis);
            if is_free(&candidate)? {
                return Ok(candidate);
            }
            millis += 1;
        }
    }
}

/// `photo.jpg` becomes `photo-<millis>.jpg`.
fn with_suffix(name: &str, millis: i64) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, millis, ext),
        _ => format!("{}-{}", name, millis),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_goes_before_extension() {
        assert_eq!(with_suffix("photo.jpg", 42), "photo-42.jpg");
        assert_eq!(with_suffix("archive.tar.gz", 42), "archive.tar-42.gz");
        assert_eq!(with_suffix("README", 42), "README-42");
        assert_eq!(with_suffix(".hidden", 42), ".hidden-42");
    }
}
