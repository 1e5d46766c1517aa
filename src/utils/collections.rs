//! Collection construction helpers.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Fresh slot map for building `NodePartial` updates.
#[must_use]
pub fn new_slot_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}
