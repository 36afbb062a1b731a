//! Deep leaf mapping over keyed structures.
//!
//! Branches (objects) are walked recursively; sequences and scalars are
//! leaves. Arrays are never entered, even when they contain objects.

use serde_json::Value;

use crate::keyed::{FieldPath, KeyedStructure, Node};

/// Replace every leaf of `structure` with `transform(leaf)`.
///
/// The result has the same keys, in the same order, at every depth.
pub fn map_leaves<F>(structure: &KeyedStructure, mut transform: F) -> KeyedStructure
where
    F: FnMut(&Value) -> Value,
{
    map_branch(structure, &mut transform)
}

fn map_branch<F>(structure: &KeyedStructure, transform: &mut F) -> KeyedStructure
where
    F: FnMut(&Value) -> Value,
{
    structure
        .iter()
        .map(|(key, value)| {
            let mapped = match Node::classify(value) {
                Node::Branch(child) => Value::Object(map_branch(child, transform)),
                Node::Sequence(_) | Node::Scalar(_) => transform(value),
            };
            (key.clone(), mapped)
        })
        .collect()
}

/// Bottom-up fold: `leaf` maps each leaf, `branch` combines the folded
/// fields of one object (in key order) into a single value.
pub fn fold_leaves<T, L, B>(structure: &KeyedStructure, leaf: &mut L, branch: &mut B) -> T
where
    L: FnMut(&Value) -> T,
    B: FnMut(Vec<(String, T)>) -> T,
{
    let mut fields = Vec::with_capacity(structure.len());
    for (key, value) in structure {
        let folded = match Node::classify(value) {
            Node::Branch(child) => fold_leaves(child, leaf, branch),
            Node::Sequence(_) | Node::Scalar(_) => leaf(value),
        };
        fields.push((key.clone(), folded));
    }
    branch(fields)
}

/// Every leaf with its path, depth-first in key order.
pub fn leaves(structure: &KeyedStructure) -> Vec<(FieldPath, &Value)> {
    let mut out = Vec::new();
    let mut path = FieldPath::root();
    collect_leaves(structure, &mut path, &mut out);
    out
}

fn collect_leaves<'a>(
    structure: &'a KeyedStructure,
    path: &mut FieldPath,
    out: &mut Vec<(FieldPath, &'a Value)>,
) {
    for (key, value) in structure {
        path.push(key.clone());
        match Node::classify(value) {
            Node::Branch(child) => collect_leaves(child, path, out),
            Node::Sequence(_) | Node::Scalar(_) => out.push((path.clone(), value)),
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    use crate::keyed::strategies::arb_structure;

    fn structure(value: Value) -> KeyedStructure {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_map_leaves_transforms_scalars_at_every_depth() {
        let s = structure(json!({"a": 1, "b": {"c": 2, "d": {"e": 3}}}));
        let doubled = map_leaves(&s, |v| json!(v.as_i64().unwrap() * 2));
        assert_eq!(
            Value::Object(doubled),
            json!({"a": 2, "b": {"c": 4, "d": {"e": 6}}})
        );
    }

    #[test]
    fn test_map_leaves_treats_sequences_as_leaves() {
        let s = structure(json!({"list": [{"inner": 1}, 2], "nested": {"tags": ["x"]}}));
        let mut seen = Vec::new();
        let mapped = map_leaves(&s, |v| {
            seen.push(v.clone());
            json!("leaf")
        });
        assert_eq!(seen, vec![json!([{"inner": 1}, 2]), json!(["x"])]);
        assert_eq!(
            Value::Object(mapped),
            json!({"list": "leaf", "nested": {"tags": "leaf"}})
        );
    }

    #[test]
    fn test_map_leaves_keeps_key_order() {
        let s = structure(json!({"z": 1, "a": {"y": 2, "b": 3}, "m": null}));
        let mapped = map_leaves(&s, Value::clone);
        let keys: Vec<&String> = mapped.keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
        let inner: Vec<&String> = mapped["a"].as_object().unwrap().keys().collect();
        assert_eq!(inner, ["y", "b"]);
    }

    #[test]
    fn test_map_leaves_empty_branch_stays_empty() {
        let s = structure(json!({"empty": {}}));
        let mapped = map_leaves(&s, |_| json!(0));
        assert_eq!(Value::Object(mapped), json!({"empty": {}}));
    }

    #[test]
    fn test_fold_leaves_counts_leaves() {
        let s = structure(json!({"a": 1, "b": {"c": [1, 2, 3], "d": "x"}}));
        let count = fold_leaves(
            &s,
            &mut |_: &Value| 1usize,
            &mut |fields: Vec<(String, usize)>| fields.iter().map(|(_, n)| n).sum(),
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn test_leaves_with_paths() {
        let s = structure(json!({"a": {"x": 10}, "b": [1]}));
        let found: Vec<(String, Value)> = leaves(&s)
            .into_iter()
            .map(|(path, v)| (path.to_string(), v.clone()))
            .collect();
        assert_eq!(
            found,
            vec![("a.x".to_string(), json!(10)), ("b".to_string(), json!([1]))]
        );
    }

    proptest! {
        #[test]
        fn map_leaves_identity_is_noop(s in arb_structure()) {
            prop_assert_eq!(map_leaves(&s, Value::clone), s);
        }

        #[test]
        fn map_leaves_visits_every_leaf(s in arb_structure()) {
            let mut visits = 0usize;
            let _ = map_leaves(&s, |v| { visits += 1; v.clone() });
            prop_assert_eq!(visits, leaves(&s).len());
        }
    }
}
