//! Update manifest model and decoding.
//!
//! A manifest is an ordered set of downloadable components pushed by the
//! device-management service. It arrives as an opaque encoded payload and is
//! decoded here into typed form; validation of *when* a manifest may be
//! acted on lives in [`processor`].

mod processor;

pub use processor::{ManifestProcessor, ProcessOutcome, RejectReason};

use serde::{Deserialize, Serialize};

/// One named unit within a manifest.
///
/// Components are downloaded independently and in manifest order; each has
/// its own source locator, declared size, and optional content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Package name; doubles as the artifact filename after validation.
    pub package: String,
    /// Component version string as reported by the service.
    pub version: String,
    /// Source locator the component bytes are fetched from.
    pub uri: String,
    /// Optional lowercase hex SHA-256 of the complete component.
    #[serde(default)]
    pub hash: Option<String>,
    /// Declared size of the component in bytes.
    pub size: u64,
}

/// An ordered sequence of components to fetch.
///
/// A manifest is created fresh on each push notification and discarded once
/// fully consumed or rejected; it is never mutated while a download derived
/// from it is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Components in download order.
    pub components: Vec<Component>,
}

impl Manifest {
    /// Decode a raw manifest payload.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::Decode` if the payload is not a well-formed
    /// manifest document.
    pub fn decode(payload: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(payload).map_err(|e| ManifestError::Decode {
            reason: e.to_string(),
        })
    }

    /// Number of components in the manifest.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Whether the manifest names no components at all.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Errors that can occur while decoding a manifest payload.
#[derive(Debug)]
pub enum ManifestError {
    /// The payload did not decode into a well-formed manifest.
    Decode { reason: String },
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode { reason } => write!(f, "failed to decode manifest: {}", reason),
        }
    }
}

impl std::error::Error for ManifestError {}
