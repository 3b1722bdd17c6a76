//! Error types for artifact storage.

use std::io;
use std::path::PathBuf;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while writing or verifying stored artifacts.
#[derive(Debug)]
pub enum StorageError {
    /// Failed to create the storage root directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to open an artifact for writing or reading.
    OpenFailed { path: PathBuf, source: io::Error },

    /// Failed to seek to a block offset inside an artifact.
    SeekFailed {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },

    /// Failed to write block data into an artifact.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to read an artifact (checksum verification).
    ReadFailed { path: PathBuf, source: io::Error },

    /// A block payload exceeded the configured block size.
    BlockTooLarge { len: usize, block_size: usize },

    /// A component package name is unusable as an artifact filename.
    InvalidPackageName { package: String, reason: String },

    /// Artifact checksum did not match the manifest hash.
    ChecksumMismatch {
        package: String,
        expected: String,
        actual: String,
    },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::OpenFailed { path, source } => {
                write!(f, "failed to open {}: {}", path.display(), source)
            }
            Self::SeekFailed {
                path,
                offset,
                source,
            } => {
                write!(
                    f,
                    "failed to seek to offset {} in {}: {}",
                    offset,
                    path.display(),
                    source
                )
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::BlockTooLarge { len, block_size } => {
                write!(
                    f,
                    "block payload of {} bytes exceeds block size {}",
                    len, block_size
                )
            }
            Self::InvalidPackageName { package, reason } => {
                write!(f, "invalid package name {:?}: {}", package, reason)
            }
            Self::ChecksumMismatch {
                package,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "checksum mismatch for {}: expected {}, got {}",
                    package, expected, actual
                )
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::OpenFailed { source, .. } => Some(source),
            Self::SeekFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::ReadFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
