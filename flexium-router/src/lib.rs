//! Client-side router bridge: path matching, navigation guards, a
//! micro-route table driving mount/unmount, and (on `wasm32`) the real
//! browser history/link-interception integration.
//!
//! The router never calls into the lifecycle engine directly — see
//! [`route_table::RouteMounter`] for why, and how the two crates are
//! wired together by the orchestrator facade.

pub mod guards;
#[cfg(target_arch = "wasm32")]
pub mod history;
#[cfg(target_arch = "wasm32")]
pub mod link;
pub mod location;
pub mod matcher;
pub mod route_table;
pub mod router;
pub mod scoped;

pub use guards::{AfterCallback, BeforeGuard, GuardRegistry};
#[cfg(target_arch = "wasm32")]
pub use history::{BrowserHistoryDriver, HistoryBridge};
#[cfg(target_arch = "wasm32")]
pub use link::link_interceptor;
pub use location::{Location, NavigationKind};
pub use matcher::{match_path, normalize_path, MatchResult};
pub use route_table::{apply_route_transition, MicroRoute, RouteMounter, RouteTable};
pub use router::{HistoryDriver, NavigateOptions, Router};
pub use scoped::ScopedRouter;
