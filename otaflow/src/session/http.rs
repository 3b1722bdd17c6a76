//! HTTP polling session.
//!
//! A concrete [`Session`] over plain HTTP: a background thread polls the
//! service's desired-state document, derives connectivity from poll
//! success, forwards manifest changes to the observer, and applies pushed
//! settings. State reports are POSTed synchronously.
//!
//! The document shape is private to this transport:
//!
//! ```text
//! GET  {base}/v1/devices/{id}/desired   -> { "manifest": {...}|null,
//!                                            "settings": {"NAME": 42, ...} }
//! POST {base}/v1/devices/{id}/state     <- StateReport as JSON
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    ConnectionState, ManifestNotification, Session, StateReport, TransportError, TransportStatus,
};
use crate::settings::SettingsRegistry;

/// Default interval between desired-state polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default timeout for a single request.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Consecutive poll failures before the session reports `Disconnected`.
const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Granularity of the poll sleep, so shutdown is not delayed by a full
/// poll interval.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Configuration for [`HttpSession`].
#[derive(Debug, Clone)]
pub struct HttpSessionConfig {
    /// Service base URL, without trailing slash.
    pub base_url: String,
    /// Device identifier used in service paths.
    pub device_id: String,
    /// Interval between desired-state polls.
    pub poll_interval: Duration,
    /// Timeout for a single request.
    pub request_timeout: Duration,
    /// Consecutive failures before reporting `Disconnected`.
    pub failure_threshold: u32,
}

impl HttpSessionConfig {
    /// Create a config for a service and device with default timings.
    pub fn new(base_url: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            device_id: device_id.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn desired_url(&self) -> String {
        format!("{}/v1/devices/{}/desired", self.base_url, self.device_id)
    }

    fn state_url(&self) -> String {
        format!("{}/v1/devices/{}/state", self.base_url, self.device_id)
    }

    fn desired_path(&self) -> String {
        format!("v1/devices/{}/desired", self.device_id)
    }
}

/// Desired-state document returned by the service.
#[derive(Debug, Deserialize)]
struct DesiredState {
    /// Current update manifest, if any.
    #[serde(default)]
    manifest: Option<serde_json::Value>,
    /// Pushed integer settings.
    #[serde(default)]
    settings: HashMap<String, i64>,
}

/// HTTP polling implementation of [`Session`].
pub struct HttpSession {
    client: Client,
    config: HttpSessionConfig,
    settings: Arc<SettingsRegistry>,
    events_tx: watch::Sender<ConnectionState>,
    observer: Mutex<Option<mpsc::Sender<ManifestNotification>>>,
    /// Raw bytes of the last manifest forwarded, for change detection.
    last_manifest: Mutex<Option<Vec<u8>>>,
    cancel: CancellationToken,
    poll_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl HttpSession {
    /// Start the session: spawns the polling thread and returns a handle.
    pub fn start(config: HttpSessionConfig, settings: Arc<SettingsRegistry>) -> Arc<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let (events_tx, _) = watch::channel(ConnectionState::Disconnected);

        let session = Arc::new(Self {
            client,
            config,
            settings,
            events_tx,
            observer: Mutex::new(None),
            last_manifest: Mutex::new(None),
            cancel: CancellationToken::new(),
            poll_thread: Mutex::new(None),
        });

        // The thread only holds a weak reference: if every external handle
        // is dropped without an explicit shutdown, the next upgrade fails
        // and the thread winds down on its own.
        let for_thread = Arc::downgrade(&session);
        let handle = thread::Builder::new()
            .name("otaflow-session-poll".to_string())
            .spawn(move || Self::poll_loop(for_thread))
            .expect("Failed to spawn session poll thread");

        *session.poll_thread.lock() = Some(handle);
        session
    }

    /// Stop polling and wait for the background thread to exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.poll_thread.lock().take() {
            let _ = handle.join();
        }
    }

    fn poll_loop(session: Weak<Self>) {
        let mut consecutive_failures = 0u32;

        loop {
            // The strong handle is scoped to one poll so it is not held
            // across the sleep; the session stays droppable at all times.
            let interval = {
                let Some(session) = session.upgrade() else { return };
                if session.cancel.is_cancelled() {
                    return;
                }

                match session.poll_desired() {
                    Ok(desired) => {
                        consecutive_failures = 0;
                        session.set_connection_state(ConnectionState::Connected);
                        session.handle_desired(desired);
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        debug!(error = %e, consecutive_failures, "desired-state poll failed");
                        if consecutive_failures >= session.config.failure_threshold {
                            session.set_connection_state(ConnectionState::Disconnected);
                        }
                    }
                }

                session.config.poll_interval
            };

            if !Self::sleep_interval(&session, interval) {
                return;
            }
        }
    }

    fn poll_desired(&self) -> Result<DesiredState, TransportError> {
        let url = self.config.desired_url();

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response.json().map_err(|e| TransportError::Request {
            url,
            reason: e.to_string(),
        })
    }

    /// Apply a polled desired-state document: settings first, then the
    /// manifest (forwarded only when it changed since the last push).
    fn handle_desired(&self, desired: DesiredState) {
        for (name, value) in &desired.settings {
            self.settings.apply(name, *value);
        }

        let Some(manifest) = desired.manifest else {
            return;
        };

        let payload = match serde_json::to_vec(&manifest) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not re-encode desired manifest");
                return;
            }
        };

        let observer = self.observer.lock();
        let Some(tx) = observer.as_ref() else {
            return;
        };

        {
            let last = self.last_manifest.lock();
            if last.as_deref() == Some(payload.as_slice()) {
                return;
            }
        }

        let notification = ManifestNotification {
            status: TransportStatus::Success,
            path: self.config.desired_path(),
            payload: payload.clone(),
        };

        match tx.try_send(notification) {
            Ok(()) => {
                *self.last_manifest.lock() = Some(payload);
            }
            Err(e) => {
                // Dedupe state is left untouched so the manifest is
                // re-offered on the next poll.
                warn!(error = %e, "manifest notification not delivered");
            }
        }
    }

    fn set_connection_state(&self, state: ConnectionState) {
        self.events_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            match state {
                ConnectionState::Connected => info!("session connected"),
                ConnectionState::Disconnected => warn!("session disconnected"),
            }
            true
        });
    }

    /// Sliced sleep between polls; returns false once the session has been
    /// dropped or shut down.
    fn sleep_interval(session: &Weak<Self>, interval: Duration) -> bool {
        let mut remaining = interval;
        while !remaining.is_zero() {
            match session.upgrade() {
                Some(session) if !session.cancel.is_cancelled() => {}
                _ => return false,
            }
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
        true
    }
}

impl Session for HttpSession {
    fn events(&self) -> watch::Receiver<ConnectionState> {
        self.events_tx.subscribe()
    }

    fn report_state(&self, report: &StateReport) -> Result<(), TransportError> {
        let url = self.config.state_url();

        let response = self
            .client
            .post(&url)
            .json(report)
            .send()
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }

        debug!(phase = ?report.phase, package = %report.package, "state reported");
        Ok(())
    }

    fn observe_manifest(
        &self,
        notifications: mpsc::Sender<ManifestNotification>,
    ) -> Result<(), TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Closed);
        }

        *self.observer.lock() = Some(notifications);
        // Forget the dedupe state so the service's current manifest is
        // delivered on the next poll, mirroring an observation's initial
        // response.
        *self.last_manifest.lock() = None;

        info!("manifest observation established");
        Ok(())
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
