//! Shared download phase.
//!
//! The phase is the one piece of state touched from two execution contexts:
//! the download driver writes it and the manifest processor reads it to
//! decide whether a new manifest may be accepted. It lives behind a single
//! atomic so readers never observe a torn value.

use std::sync::atomic::{AtomicU8, Ordering};

/// Process-wide download phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    /// No download in progress; new manifests are accepted.
    Idle,
    /// A component download is running; new manifests are rejected.
    Downloading,
    /// The most recent component download failed.
    Error,
}

impl DownloadPhase {
    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Downloading => 1,
            Self::Error => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Downloading,
            2 => Self::Error,
            _ => Self::Idle,
        }
    }

    /// Human-readable phase name for logs and state reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Downloading => "downloading",
            Self::Error => "error",
        }
    }
}

/// Shared, atomically updated [`DownloadPhase`].
///
/// Single-writer (the download driver) / multi-reader discipline; typically
/// held in an `Arc` by everyone who needs it.
#[derive(Debug)]
pub struct SharedPhase(AtomicU8);

impl SharedPhase {
    /// Create a new shared phase starting at `Idle`.
    pub fn new() -> Self {
        Self(AtomicU8::new(DownloadPhase::Idle.as_u8()))
    }

    /// Read the current phase.
    pub fn get(&self) -> DownloadPhase {
        DownloadPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replace the current phase.
    pub fn set(&self, phase: DownloadPhase) {
        self.0.store(phase.as_u8(), Ordering::Release);
    }

    /// Whether a download is currently running.
    pub fn is_downloading(&self) -> bool {
        self.get() == DownloadPhase::Downloading
    }
}

impl Default for SharedPhase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_starts_idle() {
        let phase = SharedPhase::new();
        assert_eq!(phase.get(), DownloadPhase::Idle);
        assert!(!phase.is_downloading());
    }

    #[test]
    fn test_phase_transitions() {
        let phase = SharedPhase::new();

        phase.set(DownloadPhase::Downloading);
        assert!(phase.is_downloading());

        phase.set(DownloadPhase::Error);
        assert_eq!(phase.get(), DownloadPhase::Error);

        phase.set(DownloadPhase::Idle);
        assert_eq!(phase.get(), DownloadPhase::Idle);
    }

    #[test]
    fn test_phase_as_str() {
        assert_eq!(DownloadPhase::Idle.as_str(), "idle");
        assert_eq!(DownloadPhase::Downloading.as_str(), "downloading");
        assert_eq!(DownloadPhase::Error.as_str(), "error");
    }
}
