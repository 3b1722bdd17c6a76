//! Agent main control loop.
//!
//! The runner owns the strictly ordered startup sequence and the steady
//! state loop. All transport callbacks arrive through channels; this loop
//! is the sole consumer, which keeps download phase transitions single
//! threaded even though notifications originate on the transport context.
//!
//! # Startup sequence
//!
//! 1. Register remote-configurable settings (failure logged, not fatal)
//! 2. Block on the first `Connected` event (unbounded wait)
//! 3. Report `Idle` to the service (best-effort)
//! 4. Establish manifest observation, retrying with capped exponential
//!    backoff until it succeeds
//! 5. Steady state: await the manifest slot, download components in
//!    manifest order, report phases

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::config::AgentConfig;
use super::error::AgentError;
use crate::download::{ComponentDownloader, ComponentFetcher, DownloadPhase, SharedPhase};
use crate::manifest::{Manifest, ManifestProcessor};
use crate::render::ArtifactViewer;
use crate::session::{ConnectionState, Session, StateReport};
use crate::settings::{register_loop_delay, LoopDelay, SettingsRegistry};
use crate::storage::{artifact_path, BlockStore};

/// Capacity of the raw notification channel between transport and
/// processor. Small on purpose: the processor drains it immediately and
/// the manifest slot downstream is last-write-wins anyway.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 8;

/// The OTA update agent.
///
/// # Example
///
/// ```ignore
/// use otaflow::agent::{Agent, AgentConfig};
///
/// let agent = Agent::new(config, session, fetcher, settings);
/// agent.run(cancel).await?;
/// ```
pub struct Agent {
    config: AgentConfig,
    session: Arc<dyn Session>,
    downloader: Arc<ComponentDownloader>,
    phase: Arc<SharedPhase>,
    settings: Arc<SettingsRegistry>,
    loop_delay: Arc<LoopDelay>,
    viewer: Option<Arc<dyn ArtifactViewer>>,
}

impl Agent {
    /// Assemble an agent from its collaborators.
    pub fn new(
        config: AgentConfig,
        session: Arc<dyn Session>,
        fetcher: Arc<dyn ComponentFetcher>,
        settings: Arc<SettingsRegistry>,
    ) -> Self {
        let phase = Arc::new(SharedPhase::new());
        let store = BlockStore::new(&config.storage_root, config.block_size);
        let downloader = Arc::new(ComponentDownloader::new(
            store,
            fetcher,
            Arc::clone(&phase),
        ));
        let loop_delay = Arc::new(LoopDelay::new(config.loop_delay_secs));

        Self {
            config,
            session,
            downloader,
            phase,
            settings,
            loop_delay,
            viewer: None,
        }
    }

    /// Attach a viewer for downloaded image assets.
    pub fn with_viewer(mut self, viewer: Arc<dyn ArtifactViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// The shared loop delay, for wiring into settings transports.
    pub fn loop_delay(&self) -> Arc<LoopDelay> {
        Arc::clone(&self.loop_delay)
    }

    /// Run the agent until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Configuration problems and background task failures; transport
    /// failures inside the loop are logged and retried, not returned.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), AgentError> {
        self.config.validate()?;

        info!(
            version = %self.config.version,
            storage_root = %self.config.storage_root.display(),
            block_size = self.config.block_size,
            "starting update agent"
        );

        // Settings registration is fire-and-forget.
        if let Err(e) = register_loop_delay(&self.settings, Arc::clone(&self.loop_delay)) {
            warn!(error = %e, "failed to register loop delay setting");
        }

        let cadence = tokio::spawn(cadence_loop(
            Arc::clone(&self.loop_delay),
            cancel.clone(),
        ));

        // One-shot connected gate: block until the session first reports
        // Connected. No timeout; eventual connectivity beats fast failure.
        let mut events = self.session.events();
        loop {
            if *events.borrow_and_update() == ConnectionState::Connected {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    cadence.abort();
                    return Ok(());
                }
                changed = events.changed() => {
                    if changed.is_err() {
                        cadence.abort();
                        return Err(AgentError::Transport(
                            crate::session::TransportError::Closed,
                        ));
                    }
                }
            }
        }
        info!("connected to service");

        self.report(StateReport::idle(&self.config.package, &self.config.version))
            .await;

        // Hand raw notifications to the processor; it publishes accepted
        // manifests into the single-slot watch channel consumed below.
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (processor, mut manifest_rx) = ManifestProcessor::new(Arc::clone(&self.phase));
        let processor_task = tokio::spawn(processor.run(notify_rx, cancel.clone()));

        info!("registering manifest observation");
        let backoff = Backoff::new(
            self.config.observe_retry_initial,
            self.config.observe_retry_max,
        );
        let mut attempt = 0u32;
        loop {
            let session = Arc::clone(&self.session);
            let tx = notify_tx.clone();
            let result = match task::spawn_blocking(move || session.observe_manifest(tx)).await {
                Ok(result) => result,
                Err(e) => {
                    cadence.abort();
                    processor_task.abort();
                    return Err(AgentError::Task(e.to_string()));
                }
            };

            match result {
                Ok(()) => break,
                Err(e) => {
                    let delay = backoff.delay(attempt);
                    warn!(
                        error = %e,
                        retry_in_s = delay.as_secs(),
                        "failed to observe manifest"
                    );
                    attempt += 1;
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            cadence.abort();
                            processor_task.abort();
                            return Ok(());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("waiting for update");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = manifest_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let manifest = manifest_rx.borrow_and_update().clone();
            let Some(manifest) = manifest else { continue };
            if let Err(e) = self.apply_manifest(&manifest).await {
                cadence.abort();
                processor_task.abort();
                return Err(e);
            }
        }

        cadence.abort();
        processor_task.abort();
        info!("update agent stopped");
        Ok(())
    }

    /// Download every component of an accepted manifest, in order.
    ///
    /// Per-component failures are logged and swallowed so one broken
    /// component cannot block the rest of the manifest; the phase returns
    /// to `Idle` once the manifest is consumed either way.
    async fn apply_manifest(&self, manifest: &Manifest) -> Result<(), AgentError> {
        info!(
            components = manifest.component_count(),
            "received new manifest"
        );

        for component in &manifest.components {
            info!(
                package = %component.package,
                version = %component.version,
                size = component.size,
                "component scheduled"
            );

            self.report(StateReport::downloading(
                &component.package,
                &component.version,
            ))
            .await;

            let downloader = Arc::clone(&self.downloader);
            let target = component.clone();
            let result = task::spawn_blocking(move || downloader.download(&target))
                .await
                .map_err(|e| AgentError::Task(e.to_string()))?;

            match result {
                Ok(()) => self.present(component).await,
                Err(e) => {
                    warn!(
                        package = %component.package,
                        error = %e,
                        "component failed; continuing with next"
                    );
                }
            }
        }

        self.phase.set(DownloadPhase::Idle);
        self.report(StateReport::idle(&self.config.package, &self.config.version))
            .await;

        Ok(())
    }

    /// Offer a completed artifact to the viewer, if one is attached.
    ///
    /// Non-image components are expected to fail decoding; that is not an
    /// error worth more than a debug line.
    async fn present(&self, component: &crate::manifest::Component) {
        let Some(viewer) = &self.viewer else { return };

        let path = match artifact_path(&self.config.storage_root, &component.package) {
            Ok(path) => path,
            Err(e) => {
                warn!(package = %component.package, error = %e, "cannot resolve artifact path");
                return;
            }
        };

        let viewer = Arc::clone(viewer);
        let target = component.clone();
        let result =
            task::spawn_blocking(move || viewer.present(&target, &path)).await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(package = %component.package, reason = %e, "artifact not presented"),
            Err(e) => warn!(error = %e, "viewer task failed"),
        }
    }

    /// Best-effort state report; failures are logged, never fatal.
    async fn report(&self, report: StateReport) {
        let session = Arc::clone(&self.session);
        let payload = report.clone();
        match task::spawn_blocking(move || session.report_state(&payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, phase = ?report.phase, "failed to report state"),
            Err(e) => warn!(error = %e, "state report task failed"),
        }
    }
}

/// Heartbeat cadence driven by the remotely configurable loop delay.
///
/// A delay of zero disables the heartbeat until the setting changes again.
async fn cadence_loop(delay: Arc<LoopDelay>, cancel: CancellationToken) {
    loop {
        let secs = delay.get();

        if secs <= 0 {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = delay.changed() => {}
            }
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            // A settings push wakes the sleeper so the new delay takes
            // effect immediately.
            _ = delay.changed() => {}
            _ = tokio::time::sleep(std::time::Duration::from_secs(secs as u64)) => {
                debug!(loop_delay_s = secs, "waiting for update");
            }
        }
    }
}
