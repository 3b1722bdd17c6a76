//! Presentation of downloaded image assets.
//!
//! Some components are not firmware but displayable assets (the classic
//! demo downloads a photo and shows it). Pushing pixels to an actual panel
//! is a platform concern and stays behind the [`ArtifactViewer`] seam; the
//! built-in implementation decodes the artifact to prove it is a valid
//! image and logs its dimensions.

use std::path::Path;

use tracing::info;

use crate::manifest::Component;

/// Errors from presenting an artifact.
#[derive(Debug)]
pub enum ViewError {
    /// The artifact is not a decodable image.
    Decode { package: String, reason: String },
}

impl std::fmt::Display for ViewError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode { package, reason } => {
                write!(f, "failed to decode {} as an image: {}", package, reason)
            }
        }
    }
}

impl std::error::Error for ViewError {}

/// Consumer of successfully downloaded displayable artifacts.
pub trait ArtifactViewer: Send + Sync {
    /// Present the stored artifact of a component.
    fn present(&self, component: &Component, path: &Path) -> Result<(), ViewError>;
}

/// Viewer that decodes the artifact and logs what it would display.
#[derive(Debug, Default)]
pub struct ImagePreview;

impl ImagePreview {
    /// Create a preview viewer.
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactViewer for ImagePreview {
    fn present(&self, component: &Component, path: &Path) -> Result<(), ViewError> {
        let image = image::open(path).map_err(|e| ViewError::Decode {
            package: component.package.clone(),
            reason: e.to_string(),
        })?;

        info!(
            package = %component.package,
            width = image.width(),
            height = image.height(),
            "decoded image asset"
        );

        Ok(())
    }
}
