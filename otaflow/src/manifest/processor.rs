//! Manifest acceptance and hand-off.
//!
//! The processor sits between the transport's notification channel and the
//! main control loop. For every pushed payload it decides whether the
//! manifest may be acted on, and publishes accepted manifests into a
//! single-slot `watch` channel.
//!
//! The slot is last-write-wins on purpose: if a later manifest arrives
//! before the loop consumed the previous one, only the most recent is kept.
//! That data-loss-under-backpressure policy is safe here because manifests
//! arriving during an active download are rejected anyway, and outside that
//! window at most one manifest is expected in flight.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Manifest;
use crate::download::{DownloadPhase, SharedPhase};
use crate::session::ManifestNotification;

/// Why a manifest push was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The transport reported a failure for the notification.
    TransportFailure(u16),
    /// A component download is running; the push is ignored.
    DownloadInProgress,
    /// The payload did not decode into a well-formed manifest.
    Malformed(String),
    /// The manifest names no components.
    NoComponents,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransportFailure(code) => write!(f, "transport failure (status {})", code),
            Self::DownloadInProgress => write!(f, "download in progress"),
            Self::Malformed(reason) => write!(f, "malformed payload: {}", reason),
            Self::NoComponents => write!(f, "manifest has no components"),
        }
    }
}

/// Outcome of offering one notification to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The manifest was published to the consumer slot.
    Accepted,
    /// The notification was dropped; no state was mutated.
    Rejected(RejectReason),
}

/// Validates incoming manifest pushes against the current download phase.
///
/// The processor never transitions the phase itself; it only reads it to
/// enforce the acceptance rule and hands accepted manifests off.
pub struct ManifestProcessor {
    phase: Arc<SharedPhase>,
    slot: watch::Sender<Option<Manifest>>,
}

impl ManifestProcessor {
    /// Create a processor and the receiving half of its manifest slot.
    pub fn new(phase: Arc<SharedPhase>) -> (Self, watch::Receiver<Option<Manifest>>) {
        let (slot, rx) = watch::channel(None);
        (Self { phase, slot }, rx)
    }

    /// Offer one notification.
    ///
    /// Rejections are terminal for the notification: the service re-pushes
    /// on the next relevant change, so there is nothing to retry.
    pub fn process(&self, notification: &ManifestNotification) -> ProcessOutcome {
        if let crate::session::TransportStatus::Failure(code) = notification.status {
            return ProcessOutcome::Rejected(RejectReason::TransportFailure(code));
        }

        if self.phase.get() == DownloadPhase::Downloading {
            return ProcessOutcome::Rejected(RejectReason::DownloadInProgress);
        }

        let manifest = match Manifest::decode(&notification.payload) {
            Ok(manifest) => manifest,
            Err(e) => {
                return ProcessOutcome::Rejected(RejectReason::Malformed(e.to_string()));
            }
        };

        if manifest.is_empty() {
            return ProcessOutcome::Rejected(RejectReason::NoComponents);
        }

        // Replace whatever is pending; the consumer only ever needs the
        // most recent accepted manifest.
        self.slot.send_replace(Some(manifest));
        ProcessOutcome::Accepted
    }

    /// Consume notifications until the channel closes or `cancel` fires.
    ///
    /// This is the sole reader of the transport's notification channel; it
    /// runs as a background task spawned by the agent.
    pub async fn run(
        self,
        mut notifications: mpsc::Receiver<ManifestNotification>,
        cancel: CancellationToken,
    ) {
        loop {
            let notification = tokio::select! {
                _ = cancel.cancelled() => break,
                received = notifications.recv() => match received {
                    Some(notification) => notification,
                    None => break,
                },
            };

            info!(path = %notification.path, "manifest notification received");

            match self.process(&notification) {
                ProcessOutcome::Accepted => {
                    debug!("manifest accepted and published");
                }
                ProcessOutcome::Rejected(reason) => {
                    warn!(%reason, "manifest rejected");
                }
            }
        }
    }
}
