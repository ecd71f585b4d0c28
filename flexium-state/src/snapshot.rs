use std::collections::HashMap;

use serde_json::Value;

use crate::entry::StateRegistry;

/// Atomic (batched) read of every registered key's current value.
pub fn create_state_snapshot(registry: &StateRegistry) -> HashMap<String, Value> {
    registry.all_snapshot()
}

/// Atomic (batched) write-all: re-runs each key's validator and skips
/// (rather than aborts on) any value that fails it.
///
/// Returns the keys that were skipped.
pub fn restore_state_snapshot(registry: &StateRegistry, snapshot: HashMap<String, Value>) -> Vec<String> {
    let registry_for_batch = registry.clone();
    registry_for_batch.batched(move || {
        let mut skipped = Vec::new();
        for (key, value) in snapshot {
            if !registry.restore_one(&key, value) {
                skipped.push(key);
            }
        }
        skipped
    })
}
