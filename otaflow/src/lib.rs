//! OtaFlow - Manifest-driven OTA component downloads
//!
//! This library provides the core functionality for an over-the-air update
//! agent: it observes a device-management service for update manifests,
//! downloads the named components block-by-block into local storage, and
//! reports idle/downloading phases back to the service.

pub mod agent;
pub mod download;
pub mod manifest;
pub mod render;
pub mod session;
pub mod settings;
pub mod storage;
