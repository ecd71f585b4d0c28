//! Shared kernel for the Flexium micro-frontend runtime.
//!
//! Every other `flexium-*` crate depends on this one for the error
//! taxonomy, id/clock primitives, orchestrator-wide configuration, and
//! logging bootstrap. No browser DOM access lives here — that starts at
//! `flexium-style` and up.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod logging;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
