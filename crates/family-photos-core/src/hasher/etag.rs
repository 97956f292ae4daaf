use super::digest_file;
use crate::error::Error;
use crate::storage::RecordId;
use dashmap::DashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::trace;

/// Clients may keep the bytes but have to revalidate on every use.
pub const CACHE_CONTROL: &str = "no-cache";

/// What to send back for a download request.
#[derive(Debug)]
pub enum Download {
    /// The client's copy is current; no body.
    NotModified {
        etag: String,
        cache_control: &'static str,
    },
    Content {
        etag: String,
        cache_control: &'static str,
        content_length: u64,
        body: File,
    },
}

impl Download {
    pub fn etag(&self) -> &str {
        match self {
            Download::NotModified { etag, .. } | Download::Content { etag, .. } => etag,
        }
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, Download::NotModified { .. })
    }
}

/// Content validators per record, computed on first use and kept for the
/// life of the process. Stored bytes never change, so entries are never
/// invalidated.
#[derive(Debug, Default)]
pub struct ETagCache {
    tags: DashMap<RecordId, String>,
}

impl ETagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn etag_for(&self, id: RecordId, path: &Path) -> io::Result<String> {
        if let Some(tag) = self.tags.get(&id) {
            trace!("Found etag for record {} in cache", id);
            return Ok(tag.clone());
        }

        // Hash without holding a shard lock; a concurrent miss may hash the
        // same file twice and the first insert wins.
        let tag = format!("\"{}\"", digest_file(path)?.to_hex());
        trace!("No etag for record {} in cache, adding", id);
        Ok(self.tags.entry(id).or_insert(tag).clone())
    }

    /// Answers a download of `path`, honouring an `If-None-Match` header value.
    pub fn respond(
        &self,
        id: RecordId,
        path: &Path,
        if_none_match: Option<&str>,
    ) -> Result<Download, Error> {
        let etag = match self.etag_for(id, path) {
            Ok(etag) => etag,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        if if_none_match.is_some_and(|header| matches(header, &etag)) {
            return Ok(Download::NotModified {
                etag,
                cache_control: CACHE_CONTROL,
            });
        }

        let body = File::open(path)?;
        let content_length = body.metadata()?.len();
        Ok(Download::Content {
            etag,
            cache_control: CACHE_CONTROL,
            content_length,
            body,
        })
    }
}

/// True when any entry of a comma-separated `If-None-Match` list equals `etag`.
pub fn matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').any(|t| t.trim() == etag)
}
