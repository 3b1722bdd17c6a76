//! Block-wise component download driver.
//!
//! [`ComponentDownloader`] walks a component's byte stream in fixed-size
//! blocks, fetching each range through a [`ComponentFetcher`] and handing it
//! to the block store. It owns the download phase for the duration of a
//! component: `Downloading` while blocks are in flight (which makes the
//! manifest processor reject new pushes), `Idle` on success, `Error` on
//! failure.

use std::sync::Arc;

use tracing::{info, warn};

use super::error::{DownloadError, DownloadResult};
use super::phase::{DownloadPhase, SharedPhase};
use crate::manifest::Component;
use crate::storage::{verify_artifact, BlockSink, BlockStore};

/// Source of component bytes, addressed by byte range.
///
/// One fetch call per transfer block; `len` never exceeds the configured
/// block size. Implementations are free to block (the driver runs on a
/// blocking context).
pub trait ComponentFetcher: Send + Sync {
    /// Fetch `len` bytes of `component` starting at `offset`.
    fn fetch_block(
        &self,
        component: &Component,
        offset: u64,
        len: usize,
    ) -> DownloadResult<Vec<u8>>;
}

/// Drives the download of one component at a time.
pub struct ComponentDownloader {
    store: BlockStore,
    fetcher: Arc<dyn ComponentFetcher>,
    phase: Arc<SharedPhase>,
}

impl ComponentDownloader {
    /// Create a driver over a block store and a byte source.
    pub fn new(store: BlockStore, fetcher: Arc<dyn ComponentFetcher>, phase: Arc<SharedPhase>) -> Self {
        Self {
            store,
            fetcher,
            phase,
        }
    }

    /// The shared phase this driver transitions.
    pub fn phase(&self) -> Arc<SharedPhase> {
        Arc::clone(&self.phase)
    }

    /// Download one component to completion.
    ///
    /// A fetch or storage failure aborts the remaining blocks of this
    /// component only; the caller decides whether to continue with other
    /// components. After the final block, the stored artifact is verified
    /// against the manifest hash when one is declared.
    ///
    /// # Errors
    ///
    /// Any block fetch, block write, or checksum failure.
    pub fn download(&self, component: &Component) -> DownloadResult<()> {
        info!(
            package = %component.package,
            version = %component.version,
            size = component.size,
            "starting component download"
        );

        self.phase.set(DownloadPhase::Downloading);

        let result = self.run(component);

        match &result {
            Ok(()) => {
                self.phase.set(DownloadPhase::Idle);
                info!(package = %component.package, "component download complete");
            }
            Err(e) => {
                self.phase.set(DownloadPhase::Error);
                warn!(package = %component.package, error = %e, "component download failed");
            }
        }

        result
    }

    fn run(&self, component: &Component) -> DownloadResult<()> {
        let mut store = self.store.clone();
        self.stream_blocks(component, &mut store)?;

        if let Some(hash) = &component.hash {
            let path = self.store.artifact_path(&component.package)?;
            verify_artifact(&path, &component.package, hash)?;
        }

        Ok(())
    }

    /// Fetch and write every block of `component` in ascending order.
    ///
    /// Block indices start at 0; `is_last` is true exactly for the final
    /// block of the declared size. A zero-size component still produces one
    /// empty final block so the artifact is truncated to empty.
    fn stream_blocks(&self, component: &Component, sink: &mut dyn BlockSink) -> DownloadResult<()> {
        let block_size = self.store.block_size() as u64;

        if component.size == 0 {
            sink.write_block(component, 0, &[], true)?;
            return Ok(());
        }

        let block_count = component.size.div_ceil(block_size);
        if block_count > u64::from(u32::MAX) {
            return Err(DownloadError::Fetch {
                url: component.uri.clone(),
                reason: "component too large for block-wise transfer".to_string(),
            });
        }

        for index in 0..block_count {
            let offset = index * block_size;
            let len = block_size.min(component.size - offset) as usize;

            let data = self.fetcher.fetch_block(component, offset, len)?;
            if data.len() != len {
                return Err(DownloadError::ShortRead {
                    url: component.uri.clone(),
                    expected: len,
                    actual: data.len(),
                });
            }

            let is_last = index == block_count - 1;
            sink.write_block(component, index as u32, &data, is_last)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageResult;
    use sha2::{Digest, Sha256};
    use std::fs;
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

    /// Deterministic byte pattern used by the fake fetcher.
    fn pattern(offset: u64, len: usize) -> Vec<u8> {
        (offset..offset + len as u64).map(|i| (i % 251) as u8).collect()
    }

    struct PatternFetcher;

    impl ComponentFetcher for PatternFetcher {
        fn fetch_block(&self, _c: &Component, offset: u64, len: usize) -> DownloadResult<Vec<u8>> {
            Ok(pattern(offset, len))
        }
    }

    /// Fails every fetch at or beyond the given offset.
    struct FailingFetcher {
        fail_from: u64,
    }

    impl ComponentFetcher for FailingFetcher {
        fn fetch_block(&self, c: &Component, offset: u64, len: usize) -> DownloadResult<Vec<u8>> {
            if offset >= self.fail_from {
                Err(DownloadError::Fetch {
                    url: c.uri.clone(),
                    reason: "injected failure".to_string(),
                })
            } else {
                Ok(pattern(offset, len))
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        blocks: Vec<(u32, usize, bool)>,
    }

    impl BlockSink for RecordingSink {
        fn write_block(
            &mut self,
            _component: &Component,
            block_index: u32,
            data: &[u8],
            is_last: bool,
        ) -> StorageResult<()> {
            self.blocks.push((block_index, data.len(), is_last));
            Ok(())
        }
    }

    fn downloader(root: &std::path::Path, block_size: usize, fetcher: Arc<dyn ComponentFetcher>)
        -> ComponentDownloader
    {
        ComponentDownloader::new(
            BlockStore::new(root, block_size),
            fetcher,
            Arc::new(SharedPhase::new()),
        )
    }

    #[test]
    fn test_block_sequence_indices_and_last_flag() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));
        let mut sink = RecordingSink::default();

        driver.stream_blocks(&component("fw", 30), &mut sink).unwrap();

        assert_eq!(
            sink.blocks,
            vec![(0, 10, false), (1, 10, false), (2, 10, true)]
        );
    }

    #[test]
    fn test_partial_final_block() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));
        let mut sink = RecordingSink::default();

        driver.stream_blocks(&component("fw", 25), &mut sink).unwrap();

        assert_eq!(
            sink.blocks,
            vec![(0, 10, false), (1, 10, false), (2, 5, true)]
        );
    }

    #[test]
    fn test_single_block_component_is_last_immediately() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));
        let mut sink = RecordingSink::default();

        driver.stream_blocks(&component("fw", 7), &mut sink).unwrap();

        assert_eq!(sink.blocks, vec![(0, 7, true)]);
    }

    #[test]
    fn test_download_writes_artifact_of_declared_size() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));

        driver.download(&component("fw", 30)).unwrap();

        let content = fs::read(temp.path().join("fw")).unwrap();
        assert_eq!(content.len(), 30);
        assert_eq!(content, pattern(0, 30));
        assert_eq!(driver.phase.get(), DownloadPhase::Idle);
    }

    #[test]
    fn test_download_sets_downloading_phase_while_fetching() {
        struct PhaseProbe {
            phase: Arc<SharedPhase>,
        }

        impl ComponentFetcher for PhaseProbe {
            fn fetch_block(&self, _c: &Component, offset: u64, len: usize) -> DownloadResult<Vec<u8>> {
                // Observed from the transport context mid-download.
                assert!(self.phase.is_downloading());
                Ok(pattern(offset, len))
            }
        }

        let temp = TempDir::new().unwrap();
        let phase = Arc::new(SharedPhase::new());
        let driver = ComponentDownloader::new(
            BlockStore::new(temp.path(), 10),
            Arc::new(PhaseProbe {
                phase: Arc::clone(&phase),
            }),
            Arc::clone(&phase),
        );

        driver.download(&component("fw", 20)).unwrap();
        assert_eq!(phase.get(), DownloadPhase::Idle);
    }

    #[test]
    fn test_failure_aborts_remaining_blocks() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(FailingFetcher { fail_from: 20 }));

        let result = driver.download(&component("fw", 50));

        assert!(matches!(result, Err(DownloadError::Fetch { .. })));
        assert_eq!(driver.phase.get(), DownloadPhase::Error);
        // Only the blocks before the failure were written.
        let content = fs::read(temp.path().join("fw")).unwrap();
        assert_eq!(content.len(), 20);
    }

    #[test]
    fn test_short_read_is_an_error() {
        struct ShortFetcher;
        impl ComponentFetcher for ShortFetcher {
            fn fetch_block(&self, _c: &Component, offset: u64, len: usize) -> DownloadResult<Vec<u8>> {
                Ok(pattern(offset, len.saturating_sub(1)))
            }
        }

        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(ShortFetcher));

        let result = driver.download(&component("fw", 10));
        assert!(matches!(result, Err(DownloadError::ShortRead { .. })));
    }

    #[test]
    fn test_zero_size_component_truncates_artifact() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("fw"), b"stale content").unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));

        driver.download(&component("fw", 0)).unwrap();

        let content = fs::read(temp.path().join("fw")).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_checksum_verified_after_final_block() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));

        let mut comp = component("fw", 30);
        comp.hash = Some(format!("{:x}", Sha256::digest(pattern(0, 30))));

        driver.download(&comp).unwrap();
        assert_eq!(driver.phase.get(), DownloadPhase::Idle);
    }

    #[test]
    fn test_checksum_mismatch_fails_component() {
        let temp = TempDir::new().unwrap();
        let driver = downloader(temp.path(), 10, Arc::new(PatternFetcher));

        let mut comp = component("fw", 30);
        comp.hash = Some("00".repeat(32));

        let result = driver.download(&comp);
        assert!(matches!(
            result,
            Err(DownloadError::Storage(
                crate::storage::StorageError::ChecksumMismatch { .. }
            ))
        ));
        assert_eq!(driver.phase.get(), DownloadPhase::Error);
    }
}
