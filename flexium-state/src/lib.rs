//! Shared reactive state registry: named cells that multiple micro apps
//! can read and write, with optional validation, `localStorage`
//! persistence, cross-tab synchronization, and atomic snapshot/restore.

pub mod crosstab;
pub mod entry;
pub mod persistence;
pub mod snapshot;
pub mod store;

pub use crosstab::apply_storage_event;
#[cfg(target_arch = "wasm32")]
pub use crosstab::enable_cross_tab_sync;
pub use entry::{KeyInfo, Reader, SharedOptions, StateRegistry, Validator, Writer};
pub use snapshot::{create_state_snapshot, restore_state_snapshot};
pub use store::{create_state_store, StateStore};
