use uuid::Uuid;

/// Generates a fresh id for messages, subscriptions, and requests.
///
/// Uses uuid v4 (the `js` feature pulls entropy from `crypto.getRandomValues`
/// via `getrandom`'s wasm backend, since there is no OS RNG in a browser tab).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
    }
}
