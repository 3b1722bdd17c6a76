//! Centralized artifact naming conventions.
//!
//! This module is the single source of truth for how component package names
//! map to files under the storage root. All other modules should use these
//! functions rather than constructing paths directly, so that the traversal
//! checks cannot be bypassed.

use std::path::{Path, PathBuf};

use super::error::StorageError;

/// Validate a component package name for use as an artifact filename.
///
/// Package names come from a remote manifest and are used verbatim as file
/// names, so anything that could escape the storage root is rejected:
/// path separators, `..`, NUL bytes, and names that start with a dot.
///
/// # Examples
///
/// ```
/// use otaflow::storage::sanitize_package_name;
///
/// assert!(sanitize_package_name("main").is_ok());
/// assert!(sanitize_package_name("wallpaper-2").is_ok());
/// assert!(sanitize_package_name("../etc/passwd").is_err());
/// assert!(sanitize_package_name("").is_err());
/// ```
pub fn sanitize_package_name(package: &str) -> Result<&str, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidPackageName {
        package: package.to_string(),
        reason: reason.to_string(),
    };

    if package.is_empty() {
        return Err(invalid("empty name"));
    }
    if package.starts_with('.') {
        return Err(invalid("leading dot"));
    }
    if !package
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("characters outside [A-Za-z0-9._-]"));
    }
    if package.contains("..") {
        return Err(invalid("parent directory reference"));
    }

    Ok(package)
}

/// Compute the artifact path for a component package under a storage root.
///
/// The path is deterministic: the same package always maps to the same file,
/// which is what makes retried block-0 truncation and resumed block writes
/// land on the right artifact.
///
/// # Errors
///
/// Returns an error if the package name fails validation.
pub fn artifact_path(root: &Path, package: &str) -> Result<PathBuf, StorageError> {
    let name = sanitize_package_name(package)?;
    Ok(root.join(name))
}
