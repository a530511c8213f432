use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{ContentDigest, DomainError};

const CHUNK_SIZE: usize = 8192;

/// Calculate the SHA-256 digest of a file, streaming it in fixed-size chunks.
pub fn digest_file(path: &Path) -> Result<ContentDigest, DomainError> {
    let file = File::open(path)
        .map_err(|e| DomainError::Io(format!("{}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| DomainError::Io(format!("{}: {}", path.display(), e)))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }

    let digest = ContentDigest::from_hex(format!("{:x}", hasher.finalize()));
    debug!(path = ?path, bytes = total, digest = %digest.short(), "File digested");
    Ok(digest)
}

/// Run [`digest_file`] on the blocking pool.
pub async fn digest_file_async(path: PathBuf) -> Result<ContentDigest, DomainError> {
    tokio::task::spawn_blocking(move || digest_file(&path))
        .await
        .map_err(|e| DomainError::Io(format!("Digest task join error: {}", e)))?
}
