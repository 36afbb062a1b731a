//! Settings merge that replaces arrays instead of recursing into them.
//!
//! Object-valued fields of the overlay are merged key by key; every other
//! overlay value (scalars and whole arrays) overwrites the base value. A list
//! edited in the UI is always submitted as the complete new list.

use serde_json::Value;

use crate::keyed::{KeyedStructure, Node};

/// Right-biased merge of `overlay` onto `base`.
///
/// Base-only keys keep their position; overlay-only keys are appended in
/// overlay order.
pub fn merge(base: &KeyedStructure, overlay: &KeyedStructure) -> KeyedStructure {
    let mut result = base.clone();
    for (key, overlay_value) in overlay {
        let merged = match Node::classify(overlay_value) {
            Node::Branch(overlay_child) => {
                let empty = KeyedStructure::new();
                let base_child = base.get(key).and_then(Value::as_object).unwrap_or(&empty);
                Value::Object(merge(base_child, overlay_child))
            }
            Node::Sequence(_) | Node::Scalar(_) => overlay_value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// The merge used to build a draft view.
pub trait MergeStrategy {
    fn merge(&self, base: &KeyedStructure, overlay: &KeyedStructure) -> KeyedStructure;
}

/// Default strategy: [`merge`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludingArrays;

impl MergeStrategy for ExcludingArrays {
    fn merge(&self, base: &KeyedStructure, overlay: &KeyedStructure) -> KeyedStructure {
        merge(base, overlay)
    }
}

impl<F> MergeStrategy for F
where
    F: Fn(&KeyedStructure, &KeyedStructure) -> KeyedStructure,
{
    fn merge(&self, base: &KeyedStructure, overlay: &KeyedStructure) -> KeyedStructure {
        self(base, overlay)
    }
}
