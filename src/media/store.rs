//! Disk storage for narration audio and illustration images.
//!
//! Files are named by the first 16 hex characters of their SHA-256 hash,
//! so identical content is written only once.
//!
//! ```text
//! {base_dir}/
//! ├── 3f2a9c0d1e4b5a67.mp3
//! └── deadbeef01234567.png
//! ```

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{Result, StoryError};

/// Maximum accepted media size (25 MiB).
pub const MAX_MEDIA_SIZE: usize = 25 * 1024 * 1024;

/// Content-addressed media directory.
pub struct MediaStore {
    base_dir: PathBuf,
}

impl MediaStore {
    /// The directory is created lazily on first write.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Save `data` and return its absolute path.
    ///
    /// If a file with the same hash already exists, the write is skipped.
    pub async fn save(&self, data: &[u8], mime_type: &str) -> Result<PathBuf> {
        if data.len() > MAX_MEDIA_SIZE {
            return Err(StoryError::InvalidRequest(format!(
                "Media size {} bytes exceeds the maximum of {} bytes",
                data.len(),
                MAX_MEDIA_SIZE
            )));
        }

        let filename = format!("{}.{}", sha256_prefix(data), mime_to_ext(mime_type));
        let path = self.base_dir.join(filename);

        fs::create_dir_all(&self.base_dir).await?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }
        fs::write(&path, data).await?;
        Ok(path)
    }
}

/// Map a MIME type to a file extension. Unknown types get `bin`.
pub fn mime_to_ext(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        "audio/ogg" => "ogg",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "bin",
    }
}

fn sha256_prefix(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))[..16].to_string()
}
