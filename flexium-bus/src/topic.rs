use regex::Regex;

/// What a subscription matches against.
///
/// Mirrors the three shapes `subscribe(type, ...)` accepts: a literal
/// string (indexed for O(1) lookup), the wildcard `"*"` (every message),
/// or a regular expression (scanned per dispatch).
#[derive(Clone)]
pub enum Topic {
    Literal(String),
    Wildcard,
    Regex(Regex),
}

impl Topic {
    pub fn literal(s: impl Into<String>) -> Self {
        let s = s.into();
        if s == "*" {
            Topic::Wildcard
        } else {
            Topic::Literal(s)
        }
    }

    pub fn matches(&self, message_type: &str) -> bool {
        match self {
            Topic::Literal(s) => s == message_type,
            Topic::Wildcard => true,
            Topic::Regex(re) => re.is_match(message_type),
        }
    }

    /// Identity key used by `unsubscribe_all(topic)` to find every
    /// subscription registered against the *same* topic — literal strings
    /// and regexes are compared by source text, not by object identity, so
    /// two `subscribe("foo", ...)` calls collide but `subscribe("foo")` and
    /// a regex that happens to match `"foo"` do not.
    pub fn identity_key(&self) -> TopicKey {
        match self {
            Topic::Literal(s) => TopicKey::Literal(s.clone()),
            Topic::Wildcard => TopicKey::Wildcard,
            Topic::Regex(re) => TopicKey::Regex(re.as_str().to_string()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TopicKey {
    Literal(String),
    Wildcard,
    Regex(String),
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        Topic::literal(value)
    }
}

impl From<String> for Topic {
    fn from(value: String) -> Self {
        Topic::literal(value)
    }
}

impl From<Regex> for Topic {
    fn from(value: Regex) -> Self {
        Topic::Regex(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_star_becomes_wildcard() {
        assert!(matches!(Topic::literal("*"), Topic::Wildcard));
    }

    #[test]
    fn regex_matches_independent_of_literal() {
        let topic = Topic::Regex(Regex::new(r"^order:.*$").unwrap());
        assert!(topic.matches("order:created"));
        assert!(!topic.matches("user:created"));
    }

    #[test]
    fn identity_key_distinguishes_literal_from_regex() {
        let literal = Topic::literal("foo");
        let regex = Topic::Regex(Regex::new("foo").unwrap());
        assert_ne!(literal.identity_key(), regex.identity_key());
    }
}
