//! Spells Engine - session host for the Spells inventory engine.
//!
//! This crate wires the gameplay library to the outside world:
//! configuration, file-backed save stores, the session lifecycle and the
//! JSON automation-script runner the `spells` binary executes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

/// Scripted automation for headless runs
pub mod automation;
/// Engine configuration
pub mod config;
/// Session lifecycle
pub mod session;
/// Filesystem storage backends
pub mod storage;

pub use automation::{AutomationRunner, AutomationScript, RunReport};
pub use config::EngineConfig;
pub use session::{Session, SessionError, ShutdownReport};
pub use storage::{CookieJarStorage, FileStorage};
