/// Returns the current time as epoch milliseconds.
///
/// `MicroAppInstance.last_state_change`, `BusMessage.timestamp`, and
/// `SharedStateEntry.last_update` are all stamped with this. Backed by
/// `Date.now()` rather than `std::time::SystemTime` — the latter panics on
/// `wasm32-unknown-unknown` without an explicit wasm clock shim.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_positive_and_monotonic_ish() {
        let a = now_ms();
        let b = now_ms();
        assert!(a > 0.0);
        assert!(b >= a);
    }
}
