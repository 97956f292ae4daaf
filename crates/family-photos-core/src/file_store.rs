use crate::error::Error;
use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of [`FileStore::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// There was no file at that path.
    Missing,
}

/// A regular file found by [`FileStore::enumerate`].
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    /// Depth below the enumerated folder, 1 for its direct children.
    pub depth: usize,
    pub file_name: String,
    pub size: u64,
}

impl StoredFile {
    /// Name of the directory containing the file.
    pub fn parent_name(&self) -> Option<String> {
        self.path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(str::to_string)
    }
}

/// All file access below one storage root. Relative paths are checked before
/// any syscall and may not climb out of the root.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            debug!("Created storage root {}", root.display());
        } else if !root.is_dir() {
            return Err(Error::Other(format!(
                "Storage root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `relative` onto the root after rejecting parent, root and prefix
    /// components.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let relative = relative.as_ref();
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(Error::UnsafePath(relative.display().to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Writes `bytes`, creating missing parents and replacing existing content.
    pub fn store(&self, bytes: &[u8], relative: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = self.resolve(relative)?;
        create_parent(&path)?;
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Streams `reader` into the file, returning the number of bytes written.
    pub fn store_from<R: Read>(
        &self,
        reader: &mut R,
        relative: impl AsRef<Path>,
    ) -> Result<u64, Error> {
        let path = self.resolve(relative)?;
        create_parent(&path)?;
        let mut file = File::create(&path)?;
        let written = io::copy(reader, &mut file)?;
        file.flush()?;
        Ok(written)
    }

    /// Like [`store_from`](Self::store_from) but never replaces a file: an
    /// occupied path yields `Conflict` and the reader is left untouched.
    pub fn store_new_from<R: Read>(
        &self,
        reader: &mut R,
        relative: impl AsRef<Path>,
    ) -> Result<u64, Error> {
        let path = self.resolve(relative)?;
        create_parent(&path)?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::Conflict(format!("{} already exists", path.display())));
            }
            Err(err) => return Err(err.into()),
        };
        let written = io::copy(reader, &mut file)?;
        file.flush()?;
        Ok(written)
    }

    /// Moves a file. Fails if the target is occupied; never leaves the file
    /// present at both locations.
    pub fn move_file(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<(), Error> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;

        if !source.is_file() {
            return Err(Error::NotFound(source.display().to_string()));
        }
        if target.exists() {
            return Err(Error::Conflict(format!(
                "{} already exists",
                target.display()
            )));
        }
        create_parent(&target)?;

        match fs::rename(&source, &target) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(
                    "Rename {} -> {} failed ({}), copying instead",
                    source.display(),
                    target.display(),
                    err
                );
                copy_then_remove(&source, &target)
            }
        }
    }

    pub fn delete(&self, relative: impl AsRef<Path>) -> Result<DeleteOutcome, Error> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(DeleteOutcome::Missing),
            Err(err) => Err(err.into()),
        }
    }

    pub fn exists(&self, relative: impl AsRef<Path>) -> Result<bool, Error> {
        let path = self.resolve(relative)?;
        Ok(path.try_exists()?)
    }

    /// Stamps access and modification times with a logical creation time.
    pub fn set_timestamps(&self, relative: impl AsRef<Path>, millis: i64) -> Result<(), Error> {
        let path = self.resolve(relative)?;
        if millis <= 0 {
            return Err(Error::InvalidTimestamp(millis));
        }
        let time = FileTime::from_unix_time(
            millis.div_euclid(1000),
            (millis.rem_euclid(1000) * 1_000_000) as u32,
        );
        filetime::set_file_times(&path, time, time)?;
        Ok(())
    }

    pub fn ensure_dir(&self, relative: impl AsRef<Path>) -> Result<PathBuf, Error> {
        let path = self.resolve(relative)?;
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn open_file(&self, relative: impl AsRef<Path>) -> Result<File, Error> {
        let path = self.resolve(relative)?;
        match File::open(&path) {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(path.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Regular files below `folder`, at most `max_depth` levels deep.
    /// Unreadable entries are logged and skipped; symlinks are not followed.
    pub fn enumerate(
        &self,
        folder: impl AsRef<Path>,
        max_depth: usize,
    ) -> Result<Vec<StoredFile>, Error> {
        let dir = self.resolve(folder)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(max_depth) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {}: {}", dir.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            // Names are stored as text; a lossy name would point at a file
            // that does not exist.
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping {}, its name is not valid UTF-8", entry.path().display());
                continue;
            };
            let parent_is_text = entry.depth() < 2
                || entry
                    .path()
                    .parent()
                    .and_then(|p| p.file_name())
                    .is_some_and(|n| n.to_str().is_some());
            if !parent_is_text {
                warn!(
                    "Skipping {}, its folder name is not valid UTF-8",
                    entry.path().display()
                );
                continue;
            }
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    warn!("Error getting metadata for {}: {}", entry.path().display(), err);
                    0
                }
            };
            files.push(StoredFile {
                file_name,
                depth: entry.depth(),
                path: entry.into_path(),
                size,
            });
        }
        Ok(files)
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.exists() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn copy_then_remove(source: &Path, target: &Path) -> Result<(), Error> {
    if let Err(err) = fs::copy(source, target) {
        let _ = fs::remove_file(target);
        return Err(err.into());
    }
    if let Err(err) = fs::remove_file(source) {
        if let Err(rollback) = fs::remove_file(target) {
            warn!(
                "Could not remove copy {} after failed move: {}",
                target.display(),
                rollback
            );
        }
        return Err(err.into());
    }
    Ok(())
}
