use std::collections::HashMap;

/// The router's current URL snapshot, matching the `{pathname, search,
/// hash, params}` shape committed atomically on every navigation.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    pub params: HashMap<String, String>,
}

impl Location {
    pub fn root() -> Self {
        Self { pathname: "/".to_string(), search: String::new(), hash: String::new(), params: HashMap::new() }
    }
}

/// How a navigation reached the router, mirrored onto the `router:navigate`
/// bus message's `type` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

impl NavigationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NavigationKind::Push => "push",
            NavigationKind::Replace => "replace",
            NavigationKind::Pop => "pop",
        }
    }
}
