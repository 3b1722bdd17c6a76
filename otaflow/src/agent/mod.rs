//! Update agent orchestration.
//!
//! Ties the session, manifest processing, and the download driver together
//! into one long-running control loop. The submodules split the concerns:
//!
//! - [`config`]: defaults, INI loading, validation
//! - [`runner`]: startup sequence and steady-state loop
//! - [`backoff`]: retry schedule for manifest observation
//! - [`error`]: agent-level error type

pub mod backoff;
pub mod config;
pub mod error;
pub mod runner;

pub use backoff::Backoff;
pub use config::AgentConfig;
pub use error::AgentError;
pub use runner::Agent;
