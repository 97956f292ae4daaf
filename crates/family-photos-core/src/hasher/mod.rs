pub mod etag;

pub use etag::{Download, ETagCache, CACHE_CONTROL};

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// BLAKE3 digest of the file content, streamed.
pub fn digest_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize())
}
