//! Per-app lifecycle state machine: registers micro apps, drives each one
//! through `unloaded -> loading -> loaded -> bootstrapping -> mounted ->
//! unmounting -> loaded` (or `-> error` from any hook failure), and
//! implements `flexium_router::RouteMounter` so a `Router` can drive
//! `mount`/`unmount` off navigation without this crate depending on the
//! router crate's navigation types.

pub mod engine;
pub mod instance;
mod mutex;
#[cfg(target_arch = "wasm32")]
mod remote_load;

pub use engine::LifecycleEngine;
pub use instance::{
    ActiveWhen, AppConfig, AppState, AppStatus, ContainerSelector, Lifecycle, LoadStrategy, MicroAppInstance, MountHook,
    MountTarget, PropsHook,
};
