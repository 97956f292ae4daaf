use crate::error::Error;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

pub type OwnerId = i64;
pub type RecordId = i64;

/// A principal whose media lives under `<storage_root>/<login>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: OwnerId,
    pub login: String,
    pub display_name: String,
}

impl Owner {
    /// The login is used verbatim as a folder name, so it has to be a single
    /// plain path component.
    pub fn validate_login(login: &str) -> Result<(), Error> {
        validate_component(login)
    }
}

/// One cataloged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub owner: OwnerId,
    pub name: String,
    pub folder: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub file_size: i64,
}

impl Record {
    pub fn full_name(&self) -> String {
        full_name(self.folder.as_deref(), &self.name)
    }

    /// Path of the backing file relative to the storage root.
    pub fn relative_path(&self, owner: &Owner) -> Result<PathBuf, Error> {
        if self.owner != owner.id {
            return Err(Error::Other(format!(
                "Record {} does not belong to owner {}",
                self.id, owner.login
            )));
        }
        Ok(relative_path(&owner.login, self.folder.as_deref(), &self.name))
    }
}

/// Where an inferred creation time came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimestampSource {
    Sidecar,
    FileName,
    Exif,
    FileSystem,
    Catalog,
    WallClock,
}

/// A file found by the scanner, not yet matched against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub owner: OwnerId,
    pub name: String,
    pub folder: Option<String>,
    pub created_at: i64,
    pub file_size: i64,
    pub source: TimestampSource,
}

impl ScanCandidate {
    pub fn full_name(&self) -> String {
        full_name(self.folder.as_deref(), &self.name)
    }

    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            owner: self.owner,
            name: self.name,
            folder: self.folder,
            created_at: self.created_at,
            file_size: self.file_size,
        }
    }
}

pub fn full_name(folder: Option<&str>, name: &str) -> String {
    match folder {
        Some(folder) => format!("{}/{}", folder, name),
        None => name.to_string(),
    }
}

pub fn relative_path(login: &str, folder: Option<&str>, name: &str) -> PathBuf {
    let mut path = PathBuf::from(login);
    if let Some(folder) = folder {
        path.push(folder);
    }
    path.push(name);
    path
}

/// Accepts only names that form exactly one normal path component.
pub fn validate_component(name: &str) -> Result<(), Error> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None)
            if part == name && !name.contains(['/', '\\']) =>
        {
            Ok(())
        }
        _ => Err(Error::InvalidName(name.to_string())),
    }
}
