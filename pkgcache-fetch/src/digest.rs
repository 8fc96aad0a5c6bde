use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Compute the SHA-256 hex digest of `data`.
pub fn hex_digest(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

/// Stream `path` through SHA-256 and return the lowercase hex digest.
pub async fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Hex digests compare case-insensitively; surrounding whitespace is ignored.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
