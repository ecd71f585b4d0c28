//! Style isolation for Flexium micro apps.
//!
//! Two container flavors, per the isolation strategy a host app picks for
//! each mounted remote: a shadow-DOM host (hard isolation, native `:host`
//! and `::slotted` semantics) or a scoped plain container (cheaper, CSS
//! rewritten to carry a `[data-scope]` attribute selector instead).

#[cfg(target_arch = "wasm32")]
pub mod isolation;
pub mod scope;

#[cfg(target_arch = "wasm32")]
pub use isolation::{adopt_styles, create_isolated_container, create_scoped_container, ContainerConfig, IsolatedContainer, ScopedContainer};
pub use scope::scope_styles;
