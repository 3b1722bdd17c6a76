//! Remote-configurable device settings.
//!
//! The service can push integer settings to the device; handlers registered
//! here are invoked from the transport context with the new value. Handlers
//! only store the value into shared state and wake whoever sleeps on it —
//! they never run agent logic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Name of the main-loop delay setting, as the service knows it.
pub const LOOP_DELAY_SETTING: &str = "LOOP_DELAY_S";

/// Bounds for the loop delay setting, in seconds.
pub const LOOP_DELAY_MIN: i64 = 0;
pub const LOOP_DELAY_MAX: i64 = 43200;

/// Outcome of applying a pushed setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingStatus {
    /// The value was accepted and stored.
    Applied,
    /// The handler refused the value.
    Rejected,
    /// The value lies outside the registered range.
    OutOfRange,
    /// No setting with that name is registered.
    Unknown,
}

/// Handler invoked with an accepted in-range value; returns whether the
/// value was taken.
pub type IntSettingHandler = Box<dyn Fn(i64) -> bool + Send + Sync>;

struct IntSetting {
    min: i64,
    max: i64,
    handler: IntSettingHandler,
}

/// Errors from setting registration.
#[derive(Debug, PartialEq, Eq)]
pub enum SettingsError {
    /// A setting with the same name is already registered.
    Duplicate(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate(name) => write!(f, "setting {:?} is already registered", name),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Registry of remotely configurable integer settings.
///
/// Registration happens once during agent startup; `apply` is called from
/// the transport context whenever the service pushes a value.
#[derive(Default)]
pub struct SettingsRegistry {
    entries: Mutex<HashMap<String, IntSetting>>,
}

impl SettingsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integer setting with an inclusive range.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the name is already taken.
    pub fn register_int(
        &self,
        name: impl Into<String>,
        min: i64,
        max: i64,
        handler: IntSettingHandler,
    ) -> Result<(), SettingsError> {
        let name = name.into();
        let mut entries = self.entries.lock();
        if entries.contains_key(&name) {
            return Err(SettingsError::Duplicate(name));
        }
        entries.insert(name, IntSetting { min, max, handler });
        Ok(())
    }

    /// Apply a pushed value to the named setting.
    pub fn apply(&self, name: &str, value: i64) -> SettingStatus {
        let entries = self.entries.lock();
        let Some(setting) = entries.get(name) else {
            warn!(setting = name, value, "ignoring unknown setting");
            return SettingStatus::Unknown;
        };

        if value < setting.min || value > setting.max {
            warn!(
                setting = name,
                value,
                min = setting.min,
                max = setting.max,
                "setting value out of range"
            );
            return SettingStatus::OutOfRange;
        }

        if (setting.handler)(value) {
            info!(setting = name, value, "setting applied");
            SettingStatus::Applied
        } else {
            warn!(setting = name, value, "setting rejected by handler");
            SettingStatus::Rejected
        }
    }
}

/// Shared main-loop delay with a wake signal.
///
/// The cadence task sleeps `get()` seconds between heartbeats; a settings
/// push stores the new value and wakes the sleeper so the change takes
/// effect immediately instead of after the old delay expires.
pub struct LoopDelay {
    seconds: AtomicI64,
    wake: Notify,
}

impl LoopDelay {
    /// Create with an initial delay in seconds.
    pub fn new(seconds: i64) -> Self {
        Self {
            seconds: AtomicI64::new(seconds),
            wake: Notify::new(),
        }
    }

    /// Current delay in seconds.
    pub fn get(&self) -> i64 {
        self.seconds.load(Ordering::Acquire)
    }

    /// Store a new delay and wake any sleeper.
    pub fn set(&self, seconds: i64) {
        self.seconds.store(seconds, Ordering::Release);
        self.wake.notify_waiters();
    }

    /// Resolve when `set` is next called.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }
}

/// Register the loop delay with its service-defined name and bounds.
///
/// # Errors
///
/// Returns `Duplicate` if already registered.
pub fn register_loop_delay(
    registry: &SettingsRegistry,
    delay: Arc<LoopDelay>,
) -> Result<(), SettingsError> {
    registry.register_int(
        LOOP_DELAY_SETTING,
        LOOP_DELAY_MIN,
        LOOP_DELAY_MAX,
        Box::new(move |value| {
            delay.set(value);
            true
        }),
    )
}
