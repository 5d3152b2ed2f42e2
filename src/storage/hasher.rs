//! Content hasher
//!
//! Streams bytes through BLAKE3. The pipeline always hashes what is on disk,
//! never the request buffer, so a recorded hash describes exactly what a
//! later read will return.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::error::{IntegrityError, Result};

/// Read buffer size for hashing
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest of a fully consumed stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    /// Lowercase hex BLAKE3
    pub hash: String,
    /// Bytes consumed
    pub bytes: u64,
}

/// Hash a stream to completion
pub async fn digest_reader<R>(mut reader: R) -> std::io::Result<ContentDigest>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut bytes = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        bytes += n as u64;
    }

    Ok(ContentDigest {
        hash: hasher.finalize().to_hex().to_string(),
        bytes,
    })
}

/// Hash the file at `path`
///
/// Open and read errors surface as [`IntegrityError::DigestFailed`]; no
/// partial digest is ever returned.
pub async fn digest_file(path: &Path) -> Result<ContentDigest> {
    let failed = |e: std::io::Error| IntegrityError::DigestFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let file = tokio::fs::File::open(path).await.map_err(failed)?;
    let digest = digest_reader(file).await.map_err(failed)?;
    Ok(digest)
}

/// Hash an in-memory buffer (same algorithm and encoding as [`digest_file`])
pub fn digest_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
