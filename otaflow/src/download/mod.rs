//! Block-wise component downloads.
//!
//! This module implements the download half of the update workflow:
//! - Shared download phase gating manifest acceptance (`phase`)
//! - The per-component block streaming driver (`driver`)
//! - An HTTP Range byte source (`http`)
//!
//! # Architecture
//!
//! ```text
//! ComponentDownloader (driver)
//!         │
//!         ├── ComponentFetcher (trait)
//!         │       └── HttpFetcher (Range requests per block)
//!         │
//!         ├── BlockSink / BlockStore (offset writes, block-0 truncation)
//!         │
//!         └── SharedPhase (Idle / Downloading / Error)
//! ```
//!
//! The driver fetches block `i` as the byte range
//! `[i * block_size, i * block_size + len)`, hands it to the store, and
//! flags the final block of the declared size. Failures abort the current
//! component only; the agent loop carries on with the next one.

mod driver;
mod error;
mod http;
mod phase;

pub use driver::{ComponentDownloader, ComponentFetcher};
pub use error::{DownloadError, DownloadResult};
pub use http::HttpFetcher;
pub use phase::{DownloadPhase, SharedPhase};
