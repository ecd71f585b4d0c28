/// Error taxonomy for the orchestrator's core subsystems.
///
/// Variants correspond 1:1 to the "Thrown" / "Thrown, state = error" rows of
/// the error taxonomy table: kinds that are only ever *logged* (validation
/// failures, storage failures, subscriber failures) never become an
/// `Error` value — they are `tracing::warn!` sites local to the function
/// that can hit them, per the policy that the bus, state registry, and
/// storage layer never propagate an error out to an unrelated app.
pub enum Error {
    /// `register` called with a `name` already present in the app registry.
    AlreadyRegistered(String),
    /// Any per-app operation addressed an unknown `name`.
    NotRegistered(String),
    /// `load` was called with neither `config.entry` nor `config.lifecycle`.
    NoEntryOrLifecycle(String),
    /// A remote module's exports (named or `default`) did not yield a `mount` hook.
    MalformedEntry(String),
    /// A remote entry import did not resolve before `load_timeout` elapsed.
    LoadTimeout { app: String, url: String },
    /// A `container` selector resolved to nothing in the document at mount time.
    ContainerMissing { app: String, selector: String },
    /// `bootstrap`/`mount`/`unmount`/`update` rejected or panicked.
    HookFailure { app: String, phase: &'static str, message: String },
    /// A navigation guard returned false or rejected; the URL was rolled back.
    NavigationBlocked { to: String },
    /// A bus `request()` call exceeded its timeout with no matching response.
    RequestTimeout { topic: String },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::AlreadyRegistered(name) => write!(f, "app '{name}' is already registered"),
            Error::NotRegistered(name) => write!(f, "app '{name}' is not registered"),
            Error::NoEntryOrLifecycle(name) => {
                write!(f, "app '{name}' has neither an entry URL nor an inline lifecycle")
            }
            Error::MalformedEntry(name) => {
                write!(f, "remote entry for app '{name}' did not export a `mount` hook")
            }
            Error::LoadTimeout { app, url } => {
                write!(f, "loading \"{url}\" timed out (app '{app}')")
            }
            Error::ContainerMissing { app, selector } => {
                write!(f, "mount container '{selector}' not found in document (app '{app}')")
            }
            Error::HookFailure { app, phase, message } => {
                write!(f, "{phase} hook failed for app '{app}': {message}")
            }
            Error::NavigationBlocked { to } => {
                write!(f, "navigation to '{to}' was blocked by a guard")
            }
            Error::RequestTimeout { topic } => {
                write!(f, "request on topic '{topic}' timed out with no response")
            }
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_app_name() {
        let err = Error::NotRegistered("checkout".into());
        assert_eq!(err.to_string(), "app 'checkout' is not registered");
    }

    #[test]
    fn load_timeout_mentions_url_and_app() {
        let err = Error::LoadTimeout { app: "cart".into(), url: "https://cdn/cart.js".into() };
        assert_eq!(err.to_string(), "loading \"https://cdn/cart.js\" timed out (app 'cart')");
    }

    #[test]
    fn debug_matches_display() {
        let err = Error::AlreadyRegistered("nav".into());
        assert_eq!(format!("{err:?}"), err.to_string());
    }
}
