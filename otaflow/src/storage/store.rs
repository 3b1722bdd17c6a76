//! Block-wise artifact store.
//!
//! [`BlockStore`] persists component payloads one transfer block at a time.
//! Every write seeks to the block's computed byte offset, so retried and
//! out-of-order blocks land in the right place, and block 0 truncates the
//! artifact so a restarted transfer cannot leave stale trailing bytes from
//! a previous attempt of a different size.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::naming::artifact_path;
use crate::manifest::Component;

/// Sink for transfer blocks, invoked once per block in ascending order.
///
/// This mirrors the block-write callback shape of the component fetch
/// interface: `(component, block_index, data, is_last)`. [`BlockStore`] is
/// the production implementation; tests substitute recording sinks.
pub trait BlockSink {
    /// Write one transfer block of a component.
    fn write_block(
        &mut self,
        component: &Component,
        block_index: u32,
        data: &[u8],
        is_last: bool,
    ) -> StorageResult<()>;
}

/// Flash/disk-backed store writing one file per component package.
///
/// # Example
///
/// ```ignore
/// use otaflow::storage::{BlockSink, BlockStore};
///
/// let mut store = BlockStore::new("/var/lib/otaflow", 1024);
/// store.write_block(&component, 0, &block, false)?;
/// ```
#[derive(Debug, Clone)]
pub struct BlockStore {
    /// Root directory all artifacts live under.
    root: PathBuf,
    /// Fixed transfer block size in bytes; block `i` starts at `i * block_size`.
    block_size: usize,
}

impl BlockStore {
    /// Create a store rooted at `root` with a fixed transfer block size.
    pub fn new(root: impl Into<PathBuf>, block_size: usize) -> Self {
        Self {
            root: root.into(),
            block_size,
        }
    }

    /// The configured transfer block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the artifact path for a component package.
    ///
    /// # Errors
    ///
    /// Returns an error if the package name fails validation.
    pub fn artifact_path(&self, package: &str) -> StorageResult<PathBuf> {
        artifact_path(&self.root, package)
    }
}

impl BlockSink for BlockStore {
    /// Write block `block_index` of `component` at its computed offset.
    ///
    /// Block 0 truncates the artifact before writing; later blocks open it
    /// read-write so earlier content survives. The file handle is released
    /// on every exit path. Open, seek, and write failures are all
    /// propagated to the caller so a broken medium fails the component
    /// instead of silently producing a corrupt artifact.
    fn write_block(
        &mut self,
        component: &Component,
        block_index: u32,
        data: &[u8],
        is_last: bool,
    ) -> StorageResult<()> {
        if data.len() > self.block_size {
            return Err(StorageError::BlockTooLarge {
                len: data.len(),
                block_size: self.block_size,
            });
        }

        let path = self.artifact_path(&component.package)?;

        fs::create_dir_all(&self.root).map_err(|e| StorageError::CreateDirFailed {
            path: self.root.clone(),
            source: e,
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(block_index == 0)
            .open(&path)
            .map_err(|e| StorageError::OpenFailed {
                path: path.clone(),
                source: e,
            })?;

        let offset = u64::from(block_index) * self.block_size as u64;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StorageError::SeekFailed {
                path: path.clone(),
                offset,
                source: e,
            })?;

        file.write_all(data).map_err(|e| StorageError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;

        debug!(
            package = %component.package,
            block_index,
            len = data.len(),
            is_last,
            "block written"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn component(package: &str, size: u64) -> Component {
        Component {
            package: package.to_string(),
            version: "1.0.0".to_string(),
            uri: format!("http://example.com/{}", package),
            hash: None,
            size,
        }
    }

    #[test]
    fn test_in_order_blocks_concatenate() {
        let temp = TempDir::new().unwrap();
        let mut store = BlockStore::new(temp.path(), 4);
        let comp = component("fw", 10);

        store.write_block(&comp, 0, b"aaaa", false).unwrap();
        store.write_block(&comp, 1, b"bbbb", false).unwrap();
        store.write_block(&comp, 2, b"cc", true).unwrap();

        let content = fs::read(temp.path().join("fw")).unwrap();
        assert_eq!(content, b"aaaabbbbcc");
    }

    #[test]
    fn test_block_zero_truncates_previous_attempt() {
        let temp = TempDir::new().unwrap();
        let mut store = BlockStore::new(temp.path(), 4);
        let comp = component("fw", 12);

        // First attempt writes three full blocks.
        store.write_block(&comp, 0, b"xxxx", false).unwrap();
        store.write_block(&comp, 1, b"yyyy", false).unwrap();
        store.write_block(&comp, 2, b"zzzz", true).unwrap();

        // Restart at block 0: the artifact must be truncated back to
        // exactly the new block, with no stale trailing bytes.
        store.write_block(&comp, 0, b"ab", false).unwrap();

        let content = fs::read(temp.path().join("fw")).unwrap();
        assert_eq!(content, b"ab");
    }

    #[test]
    fn test_retried_block_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let mut store = BlockStore::new(temp.path(), 4);
        let comp = component("fw", 8);

        store.write_block(&comp, 0, b"aaaa", false).unwrap();
        store.write_block(&comp, 1, b"bbbb", true).unwrap();
        // Retransmission of block 1 lands at the same offset.
        store.write_block(&comp, 1, b"bbbb", true).unwrap();

        let content = fs::read(temp.path().join("fw")).unwrap();
        assert_eq!(content, b"aaaabbbb");
    }

    #[test]
    fn test_out_of_order_block_lands_at_offset() {
        let temp = TempDir::new().unwrap();
        let mut store = BlockStore::new(temp.path(), 4);
        let comp = component("fw", 8);

        store.write_block(&comp, 0, b"aaaa", false).unwrap();
        store.write_block(&comp, 2, b"cc", true).unwrap();
        store.write_block(&comp, 1, b"bbbb", false).unwrap();

        let content = fs::read(temp.path().join("fw")).unwrap();
        assert_eq!(content, b"aaaabbbbcc");
    }

    #[test]
    fn test_oversized_block_rejected() {
        let temp = TempDir::new().unwrap();
        let mut store = BlockStore::new(temp.path(), 4);
        let comp = component("fw", 8);

        let result = store.write_block(&comp, 0, b"aaaaa", false);
        assert!(matches!(result, Err(StorageError::BlockTooLarge { .. })));
    }

    #[test]
    fn test_traversal_package_name_rejected() {
        let temp = TempDir::new().unwrap();
        let mut store = BlockStore::new(temp.path(), 4);
        let comp = component("../escape", 4);

        let result = store.write_block(&comp, 0, b"aaaa", true);
        assert!(matches!(
            result,
            Err(StorageError::InvalidPackageName { .. })
        ));
    }

    #[test]
    fn test_creates_storage_root_on_demand() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join("storage");
        let mut store = BlockStore::new(&root, 4);
        let comp = component("fw", 2);

        store.write_block(&comp, 0, b"ab", true).unwrap();
        assert_eq!(fs::read(root.join("fw")).unwrap(), b"ab");
    }

    proptest! {
        /// Delivering blocks 0..n in order always reproduces the payload
        /// byte-for-byte, for any payload and block size.
        #[test]
        fn prop_in_order_delivery_reproduces_payload(
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            block_size in 1usize..64,
        ) {
            let temp = TempDir::new().unwrap();
            let mut store = BlockStore::new(temp.path(), block_size);
            let comp = component("fw", payload.len() as u64);

            let chunks: Vec<&[u8]> = payload.chunks(block_size).collect();
            for (i, chunk) in chunks.iter().enumerate() {
                let is_last = i == chunks.len() - 1;
                store.write_block(&comp, i as u32, chunk, is_last).unwrap();
            }

            if !payload.is_empty() {
                let content = fs::read(temp.path().join("fw")).unwrap();
                prop_assert_eq!(content, payload);
            }
        }
    }
}
