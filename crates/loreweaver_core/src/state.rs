//! Typed character state and the sparse patch operation applied to it.
//!
//! The mutable half of a character is a string-keyed map of a small closed
//! set of value variants. A patch entry with a JSON `null` value removes the
//! key; any other value overwrites or inserts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of values a character-state key may hold.
///
/// Untagged: `5` deserializes as `Int(5)`, `"wary"` as `Text`, etc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<StateValue>),
}

/// A character's mutable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterState(pub BTreeMap<String, StateValue>);

impl CharacterState {
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply a sparse patch: `None` removes the key, `Some` overwrites or
    /// inserts. Keys absent from the patch are untouched.
    pub fn apply(&mut self, patch: &StatePatch) {
        for (key, value) in &patch.0 {
            match value {
                Some(v) => {
                    self.0.insert(key.clone(), v.clone());
                }
                None => {
                    self.0.remove(key);
                }
            }
        }
    }

    /// Compact one-line rendering for prompt injection.
    pub fn render(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A sparse state update. Deserialized straight from JSON: a `null` entry
/// becomes `None` (delete), everything else `Some` (set).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePatch(pub BTreeMap<String, Option<StateValue>>);

impl StatePatch {
    pub fn set(mut self, key: impl Into<String>, value: StateValue) -> Self {
        self.0.insert(key.into(), Some(value));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.0.insert(key.into(), None);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state_from_json(raw: &str) -> CharacterState {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn patch_null_removes_and_value_overwrites() {
        let mut state = state_from_json(r#"{"trust": 1, "fear": 3, "name": "Ana"}"#);
        let patch: StatePatch = serde_json::from_str(r#"{"trust": 5, "fear": null}"#).unwrap();

        state.apply(&patch);

        assert_eq!(state.get("trust"), Some(&StateValue::Int(5)));
        assert_eq!(state.get("fear"), None);
        assert_eq!(state.get("name"), Some(&StateValue::Text("Ana".into())));
        assert_eq!(state.0.len(), 2);
    }

    #[test]
    fn patch_inserts_new_keys() {
        let mut state = CharacterState::default();
        state.apply(&StatePatch::default().set("mood", StateValue::Text("wary".into())));
        assert_eq!(state.get("mood"), Some(&StateValue::Text("wary".into())));
    }

    #[test]
    fn removing_absent_key_is_a_noop() {
        let mut state = state_from_json(r#"{"trust": 1}"#);
        state.apply(&StatePatch::default().remove("fear"));
        assert_eq!(state.0.len(), 1);
    }

    #[test]
    fn untagged_values_deserialize_by_shape() {
        let state = state_from_json(r#"{"a": true, "b": 2, "c": 2.5, "d": "x", "e": [1, "y"]}"#);
        assert_eq!(state.get("a"), Some(&StateValue::Bool(true)));
        assert_eq!(state.get("b"), Some(&StateValue::Int(2)));
        assert_eq!(state.get("c"), Some(&StateValue::Float(2.5)));
        assert_eq!(state.get("d"), Some(&StateValue::Text("x".into())));
        assert!(matches!(state.get("e"), Some(StateValue::List(items)) if items.len() == 2));
    }

    #[test]
    fn render_is_valid_json() {
        let state = state_from_json(r#"{"trust": 1, "name": "Ana"}"#);
        let rendered = state.render();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["trust"], 1);
    }

    proptest! {
        /// Applying the same patch twice yields the same state as applying
        /// it once (patches are idempotent).
        #[test]
        fn patch_application_is_idempotent(
            keys in proptest::collection::vec("[a-z]{1,6}", 0..8),
            vals in proptest::collection::vec(any::<i64>(), 0..8),
        ) {
            let mut patch = StatePatch::default();
            for (i, key) in keys.iter().enumerate() {
                if i % 3 == 0 {
                    patch = patch.remove(key.clone());
                } else {
                    patch = patch.set(key.clone(), StateValue::Int(vals.get(i).copied().unwrap_or(0)));
                }
            }

            let mut once = CharacterState::default();
            once.apply(&patch);
            let mut twice = once.clone();
            twice.apply(&patch);
            prop_assert_eq!(once, twice);
        }
    }
}
