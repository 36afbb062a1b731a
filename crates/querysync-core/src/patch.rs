//! Declarative updates to cached query results.
//!
//! A `Patch` describes what to change and where. Applying it rebuilds only
//! the addressed path: sibling keys keep their position and value.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::keyed::{FieldPath, KeyedStructure, NodeKind};
use crate::leaves::fold_leaves;

/// Function applied to the current value at a patch location.
pub type ApplyFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone)]
pub enum Patch {
    /// Replace the value.
    Set(Value),
    /// Replace the value with `f(current)`. A missing value is `Null`.
    Apply(ApplyFn),
    /// Descend into an object and patch the named fields.
    Fields(Vec<(String, Patch)>),
    /// Apply the inner patch only where a non-null value already exists.
    Existing(Box<Patch>),
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Patch::Set(value) => f.debug_tuple("Set").field(value).finish(),
            Patch::Apply(_) => f.write_str("Apply(..)"),
            Patch::Fields(fields) => f.debug_map().entries(fields.iter().map(|(k, p)| (k, p))).finish(),
            Patch::Existing(inner) => f.debug_tuple("Existing").field(inner).finish(),
        }
    }
}

impl Patch {
    pub fn set(value: impl Into<Value>) -> Self {
        Patch::Set(value.into())
    }

    pub fn apply<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Patch::Apply(Arc::new(f))
    }

    /// Nest `patch` under `path`. The root path returns `patch` itself.
    pub fn at(path: &FieldPath, patch: Patch) -> Self {
        path.segments()
            .iter()
            .rev()
            .fold(patch, |inner, segment| Patch::Fields(vec![(segment.clone(), inner)]))
    }

    /// Like [`Patch::at`], but every step of `path` must already exist.
    /// Missing or null keys along the way are left alone.
    pub fn at_existing(path: &FieldPath, patch: Patch) -> Self {
        path.segments().iter().rev().fold(patch, |inner, segment| {
            Patch::Fields(vec![(segment.clone(), Patch::Existing(Box::new(inner)))])
        })
    }

    /// One `Set` per leaf of `input`, at the same path.
    pub fn set_leaves(input: &KeyedStructure) -> Self {
        fold_leaves(
            input,
            &mut |leaf: &Value| Patch::Set(leaf.clone()),
            &mut Patch::Fields,
        )
    }

    /// Apply this patch to `current`, returning the replacement value.
    pub fn apply_to(&self, current: Value) -> Value {
        match self {
            Patch::Set(value) => value.clone(),
            Patch::Apply(f) => f(current),
            Patch::Fields(fields) => match current {
                Value::Object(map) => Value::Object(apply_fields(map, fields)),
                Value::Null => Value::Object(apply_fields(KeyedStructure::new(), fields)),
                other => {
                    debug!(
                        kind = ?NodeKind::of(&other),
                        "Cannot patch fields of a non-object value, leaving it untouched"
                    );
                    other
                }
            },
            Patch::Existing(_) if current.is_null() => current,
            Patch::Existing(inner) => inner.apply_to(current),
        }
    }
}

fn apply_fields(mut map: KeyedStructure, fields: &[(String, Patch)]) -> KeyedStructure {
    for (key, patch) in fields {
        match map.get_mut(key) {
            Some(slot) => {
                let current = std::mem::take(slot);
                *slot = patch.apply_to(current);
            }
            None if matches!(patch, Patch::Existing(_)) => {
                debug!(key = %key, "Key is absent, skipping patch");
            }
            None => {
                map.insert(key.clone(), patch.apply_to(Value::Null));
            }
        }
    }
    map
}

/// Apply `patch` to a whole cached result.
///
/// A root-level `Set` or `Apply` that does not produce an object leaves
/// `prev` unchanged.
pub fn apply_patch(prev: KeyedStructure, patch: &Patch) -> KeyedStructure {
    match patch {
        Patch::Fields(fields) => apply_fields(prev, fields),
        other => match other.apply_to(Value::Object(prev.clone())) {
            Value::Object(next) => next,
            produced => {
                debug!(
                    kind = ?NodeKind::of(&produced),
                    "Root patch did not produce an object, keeping previous value"
                );
                prev
            }
        },
    }
}

/// Remove every element of the array at `path` whose `id` equals `id`.
///
/// Used to drop an entity from a cached listing. A missing listing, or a
/// value at `path` that is not an array, is left as is.
pub fn remove_by_id(path: &FieldPath, id: impl Into<String>) -> Patch {
    let id = id.into();
    Patch::at_existing(
        path,
        Patch::apply(move |nodes| match nodes {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .filter(|node| node.get("id").and_then(Value::as_str) != Some(id.as_str()))
                    .collect(),
            ),
            other => {
                debug!(kind = ?NodeKind::of(&other), "Listing is not a sequence, nothing to remove");
                other
            }
        }),
    )
}
