//! ROM content hashing
//!
//! One streaming pass produces every digest DAT tools match on.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Digests of one file, hex encoded in lowercase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    pub size: u64,
    pub crc32: String,
    pub sha1: String,
    pub sha256: String,
}

/// Size, CRC32, SHA-1 and SHA-256 of a file, read in fixed-size chunks
pub fn hash_file(path: &Path) -> std::io::Result<FileHashes> {
    let mut file = std::fs::File::open(path)?;
    let mut crc = crc32fast::Hasher::new();
    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut size = 0u64;

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        crc.update(&buffer[..n]);
        sha1.update(&buffer[..n]);
        sha256.update(&buffer[..n]);
    }

    Ok(FileHashes {
        size,
        crc32: format!("{:08x}", crc.finalize()),
        sha1: hex::encode(sha1.finalize()),
        sha256: hex::encode(sha256.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hash_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rom.bin");
        std::fs::write(&path, b"hello world").unwrap();

        let hashes = hash_file(&path).unwrap();
        assert_eq!(hashes.size, 11);
        assert_eq!(hashes.crc32, "0d4a1185");
        assert_eq!(hashes.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(
            hashes.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let hashes = hash_file(&path).unwrap();
        assert_eq!(hashes.size, 0);
        assert_eq!(hashes.crc32, "00000000");
        assert_eq!(hashes.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }
}
