use std::collections::HashMap;

use regex::Regex;

/// Result of [`match_path`]: whether `pattern` matched, the captured
/// `:name` params, the normalized path it was tested against, and the
/// prefix of that path the pattern actually consumed (used by
/// `createScopedRouter` to strip a parent's base path off a child route).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub params: HashMap<String, String>,
    pub path: String,
    pub base_path: String,
}

impl MatchResult {
    fn none(path: String) -> Self {
        Self { matched: false, params: HashMap::new(), path, base_path: String::new() }
    }
}

/// Strips a single trailing slash (empty path becomes `/`), matching the
/// "trailing slashes are normalized away" rule.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    if path.len() > 1 && path.ends_with('/') {
        path[..path.len() - 1].to_string()
    } else {
        path.to_string()
    }
}

/// Builds the regex body for a route `pattern`: `:name` segments become a
/// named capture group matching any run of non-slash characters, and a
/// bare `*` segment becomes `.*`. Every other segment is matched literally
/// (regex-escaped).
fn pattern_regex_body(pattern: &str) -> String {
    let normalized = normalize_path(pattern);
    normalized
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("(?P<{name}>[^/]+)")
            } else if segment == "*" {
                ".*".to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Tests `pathname` against `pattern`. In `exact` mode the pattern must
/// consume the whole (normalized) path; otherwise it only anchors at the
/// start, and `base_path` reports how much of the path it consumed (the
/// rest is the portion a nested/scoped router would see as relative).
pub fn match_path(pathname: &str, pattern: &str, exact: bool) -> MatchResult {
    let path = normalize_path(pathname);
    let body = pattern_regex_body(pattern);
    let regex_source = if exact { format!("^{body}$") } else { format!("^{body}") };

    let Ok(re) = Regex::new(&regex_source) else {
        return MatchResult::none(path);
    };

    match re.captures(&path) {
        Some(caps) => {
            let whole = caps.get(0).expect("capture 0 always present on a match");
            let mut params = HashMap::new();
            for name in re.capture_names().flatten() {
                if let Some(value) = caps.name(name) {
                    params.insert(name.to_string(), value.as_str().to_string());
                }
            }
            let base_path = path[..whole.end()].to_string();
            MatchResult { matched: true, params, path, base_path }
        }
        None => MatchResult::none(path),
    }
}
