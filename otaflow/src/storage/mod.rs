//! Flash/disk-backed artifact storage for downloaded components.
//!
//! This module provides everything the download driver needs to persist
//! component payloads:
//! - Block-wise writes at computed byte offsets (`store`)
//! - Deterministic, traversal-safe artifact naming (`naming`)
//! - SHA-256 verification against manifest hashes (`checksum`)
//!
//! Each component maps to exactly one file under the storage root, named
//! after its (validated) package name. Block `i` of a component occupies
//! the byte range `[i * block_size, i * block_size + len)` of that file,
//! and block 0 truncates it so a restarted transfer starts clean.

mod checksum;
mod error;
mod naming;
mod store;

pub use checksum::{artifact_checksum, verify_artifact};
pub use error::{StorageError, StorageResult};
pub use naming::{artifact_path, sanitize_package_name};
pub use store::{BlockSink, BlockStore};
