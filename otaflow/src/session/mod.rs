//! Logical session with the device-management service.
//!
//! The transport internals (wire protocol, TLS, credentials) are out of
//! scope; this module defines the contract the rest of the agent programs
//! against, plus the shared event and notification types.
//!
//! # Architecture
//!
//! ```text
//! transport context                          main control loop
//! ─────────────────                          ─────────────────
//! connectivity change ──► watch<ConnectionState> ──► one-shot connected gate
//! manifest push       ──► mpsc<ManifestNotification> ──► ManifestProcessor
//! state report        ◄── report_state(StateReport)
//! ```
//!
//! Callbacks from the transport never run agent logic themselves; they hand
//! off through channels so the main loop stays the sole owner of download
//! state transitions.

mod http;

pub use http::{HttpSession, HttpSessionConfig};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Connectivity of the logical service session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session established.
    Disconnected,
    /// Session established; service calls may proceed.
    Connected,
}

/// Transport-level status attached to an observation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// The notification carries a valid payload.
    Success,
    /// The transport reported a failure code; the payload is not usable.
    Failure(u16),
}

impl TransportStatus {
    /// Whether the notification payload may be processed.
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One asynchronous manifest push from the service.
#[derive(Debug, Clone)]
pub struct ManifestNotification {
    /// Transport-level delivery status.
    pub status: TransportStatus,
    /// Observed resource path the payload was delivered for.
    pub path: String,
    /// Opaque encoded manifest payload.
    pub payload: Vec<u8>,
}

/// Reportable phase of the update workflow, as the service models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPhase {
    /// Waiting for work.
    Idle,
    /// A component download is in progress.
    Downloading,
}

/// State report sent back to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateReport {
    /// Current phase.
    pub phase: ReportPhase,
    /// Short reason string ("ready", "component failed", ...).
    pub reason: String,
    /// Package the report concerns.
    pub package: String,
    /// Version the report concerns.
    pub version: String,
}

impl StateReport {
    /// Idle report for the named package/version.
    pub fn idle(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            phase: ReportPhase::Idle,
            reason: "ready".to_string(),
            package: package.into(),
            version: version.into(),
        }
    }

    /// Downloading report for the named package/version.
    pub fn downloading(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            phase: ReportPhase::Downloading,
            reason: "in progress".to_string(),
            package: package.into(),
            version: version.into(),
        }
    }
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A request could not be sent or completed.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The service answered with a non-success status.
    #[error("service returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// The session has been shut down.
    #[error("session is closed")]
    Closed,
}

/// Contract of the device-management session consumed by the agent.
///
/// Implementations own their transport and background delivery tasks; all
/// methods may block briefly but must not run agent logic. The production
/// implementation is [`HttpSession`]; tests provide in-memory fakes.
pub trait Session: Send + Sync {
    /// Connectivity events, latest value wins.
    ///
    /// The receiver starts at the current state; the agent treats the first
    /// observed `Connected` as its one-shot startup gate.
    fn events(&self) -> watch::Receiver<ConnectionState>;

    /// Report the device's update phase to the service. Best-effort from
    /// the caller's point of view; failures are returned, not retried here.
    fn report_state(&self, report: &StateReport) -> Result<(), TransportError>;

    /// Establish the manifest observation.
    ///
    /// On success, manifest pushes are delivered into `notifications` until
    /// the session shuts down, starting with the service's current manifest
    /// if one exists.
    fn observe_manifest(
        &self,
        notifications: mpsc::Sender<ManifestNotification>,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_status_success() {
        assert!(TransportStatus::Success.is_success());
        assert!(!TransportStatus::Failure(500).is_success());
    }

    #[test]
    fn test_state_report_constructors() {
        let idle = StateReport::idle("main", "1.0.0");
        assert_eq!(idle.phase, ReportPhase::Idle);
        assert_eq!(idle.reason, "ready");

        let downloading = StateReport::downloading("fw", "2.0.0");
        assert_eq!(downloading.phase, ReportPhase::Downloading);
        assert_eq!(downloading.package, "fw");
    }

    #[test]
    fn test_state_report_serializes_lowercase_phase() {
        let report = StateReport::idle("main", "1.0.0");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""phase":"idle""#));
    }
}
