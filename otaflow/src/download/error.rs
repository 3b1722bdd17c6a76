//! Error types for component downloads.

use crate::storage::StorageError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while downloading a component.
#[derive(Debug)]
pub enum DownloadError {
    /// A block fetch could not be sent or completed.
    Fetch { url: String, reason: String },

    /// The source answered a block fetch with a non-success status.
    Status { url: String, status: u16 },

    /// The source returned fewer or more bytes than the requested range.
    ShortRead {
        url: String,
        expected: usize,
        actual: usize,
    },

    /// Writing or verifying the stored artifact failed.
    Storage(StorageError),
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { url, reason } => {
                write!(f, "failed to fetch {}: {}", url, reason)
            }
            Self::Status { url, status } => {
                write!(f, "fetch of {} returned status {}", url, status)
            }
            Self::ShortRead {
                url,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "short read from {}: expected {} bytes, got {}",
                    url, expected, actual
                )
            }
            Self::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for DownloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for DownloadError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_display() {
        let err = DownloadError::ShortRead {
            url: "http://example.com/fw".to_string(),
            expected: 1024,
            actual: 100,
        };
        assert!(err.to_string().contains("short read"));
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn test_storage_error_wraps_source() {
        let err: DownloadError = StorageError::BlockTooLarge {
            len: 10,
            block_size: 4,
        }
        .into();
        assert!(matches!(err, DownloadError::Storage(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
