//! Per-node trait metadata: a small string-keyed property bag attached
//! at build time (recordable id, display label, persistence hints)
//! that compute implementations and host bridges can read back without
//! the graph needing a bespoke field for every such property.

use rustc_hash::FxHashMap;

use crate::value::ScalarValue;

#[derive(Debug, Clone, Default)]
pub struct Traits {
    entries: FxHashMap<String, ScalarValue>,
}

impl Traits {
    pub fn new() -> Self {
        Traits::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.entries.get(key)
    }

    /// The key under which a node's persisted snapshot is recorded.
    /// Falls back to the node's graph-assigned name if no explicit
    /// `recordable_id` trait was set.
    pub fn recordable_id(&self, fallback_name: &str) -> String {
        match self.get("recordable_id") {
            Some(ScalarValue::Text(s)) => s.clone(),
            _ => fallback_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recordable_id_falls_back_to_the_node_name_when_unset() {
        let traits = Traits::new();
        assert_eq!(traits.recordable_id("node_7"), "node_7");
    }

    #[test]
    fn recordable_id_prefers_an_explicit_trait_entry() {
        let traits = Traits::new().with("recordable_id", "custom_id");
        assert_eq!(traits.recordable_id("node_7"), "custom_id");
    }

    #[test]
    fn get_returns_none_for_an_unset_key() {
        let traits = Traits::new();
        assert!(traits.get("missing").is_none());
    }
}
