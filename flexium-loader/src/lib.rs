//! Module Federation-style remote loader: ESM/SystemJS dynamic `import()`,
//! UMD/global script-tag loading, a shared-module singleton policy, and
//! federated component helpers.

pub mod container;
pub mod federation;
pub mod shared;

#[cfg(target_arch = "wasm32")]
pub mod remote;

pub use container::{RemoteContainer, RemoteFormat, RemoteState};
pub use federation::{RemoteLoader, RemoteSpec};
pub use shared::{SharedModuleRegistry, SharedModuleSpec};

#[cfg(target_arch = "wasm32")]
pub use remote::{federated_component, import_federated, load_remote, load_remote_module, preload_remotes};
