//! SHA-256 checksum calculation for stored artifacts.
//!
//! Update manifests carry an optional content hash per component; after the
//! final block of a component has been written, the stored artifact is
//! verified against it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::error::{StorageError, StorageResult};

/// Buffer size for reading artifacts during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the lowercase hex SHA-256 digest of a stored artifact.
///
/// # Errors
///
/// Returns an error if the artifact cannot be read.
pub fn artifact_checksum(path: &Path) -> StorageResult<String> {
    let mut file = File::open(path).map_err(|e| StorageError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| StorageError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify a stored artifact against the hash declared in a manifest.
///
/// The comparison is case-insensitive on the expected side since manifests
/// in the wild carry both upper and lowercase hex.
///
/// # Errors
///
/// Returns `ChecksumMismatch` if the digests differ, or a read error if the
/// artifact cannot be hashed.
pub fn verify_artifact(path: &Path, package: &str, expected: &str) -> StorageResult<()> {
    let actual = artifact_checksum(path)?;
    if actual != expected.to_ascii_lowercase() {
        return Err(StorageError::ChecksumMismatch {
            package: package.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    // SHA-256 of "hello world"
    const HELLO_DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_artifact(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_artifact_checksum() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "main", b"hello world");

        assert_eq!(artifact_checksum(&path).unwrap(), HELLO_DIGEST);
    }

    #[test]
    fn test_artifact_checksum_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "main", b"");

        // SHA-256 of the empty string
        assert_eq!(
            artifact_checksum(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_artifact_checksum_missing_file() {
        let result = artifact_checksum(Path::new("/nonexistent/artifact"));
        assert!(matches!(result, Err(StorageError::ReadFailed { .. })));
    }

    #[test]
    fn test_verify_artifact_match() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "main", b"hello world");

        assert!(verify_artifact(&path, "main", HELLO_DIGEST).is_ok());
    }

    #[test]
    fn test_verify_artifact_uppercase_expected() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "main", b"hello world");

        assert!(verify_artifact(&path, "main", &HELLO_DIGEST.to_ascii_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_artifact_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "main", b"hello world");

        let result = verify_artifact(&path, "main", "deadbeef");
        match result {
            Err(StorageError::ChecksumMismatch { package, actual, .. }) => {
                assert_eq!(package, "main");
                assert_eq!(actual, HELLO_DIGEST);
            }
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
    }
}
