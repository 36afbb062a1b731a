//! Pending settings edits shown merged over the server's settings.
//!
//! `DraftOverlay` owns the user's uncommitted edits and caches the merged
//! view of base-plus-draft. Change detection uses generation tags, never
//! deep equality: a [`Versioned`] value gets a fresh generation whenever it
//! is replaced, and clones share the generation of their source. Callers
//! must therefore replace base settings wholesale (`Versioned::new`) when
//! new server data arrives.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PathError, SubmitError};
use crate::keyed::{set_path, FieldPath, KeyedStructure};
use crate::merge::{ExcludingArrays, MergeStrategy};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Identity tag of a `Versioned` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    fn next() -> Self {
        Generation(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Shared immutable value tagged with a generation.
#[derive(Debug)]
pub struct Versioned<T> {
    value: Arc<T>,
    generation: Generation,
}

impl<T> Versioned<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            generation: Generation::next(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    /// Replace the value, minting a new generation.
    pub fn replace(&mut self, value: T) {
        *self = Self::new(value);
    }

    pub fn same_identity(&self, other: &Self) -> bool {
        self.generation == other.generation
    }
}

impl<T> Clone for Versioned<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            generation: self.generation,
        }
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Default> Default for Versioned<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Base settings with pending edits applied.
pub type MergedView = Arc<KeyedStructure>;

/// Submits a settings draft to the server.
pub trait SettingsSubmitter: Send + Sync {
    fn submit<'a>(&'a self, draft: &'a KeyedStructure) -> BoxFuture<'a, Result<(), SubmitError>>;
}

/// Result of [`DraftOverlay::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum SaveOutcome {
    Saved,
    Failed { messages: Vec<String> },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved)
    }
}

#[derive(Debug)]
struct CachedView {
    base: Generation,
    pending: Generation,
    view: MergedView,
}

pub struct DraftOverlay<M = ExcludingArrays> {
    strategy: M,
    pending: Versioned<KeyedStructure>,
    cached: Option<CachedView>,
}

impl DraftOverlay<ExcludingArrays> {
    pub fn new() -> Self {
        Self::with_strategy(ExcludingArrays)
    }
}

impl Default for DraftOverlay<ExcludingArrays> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MergeStrategy> DraftOverlay<M> {
    pub fn with_strategy(strategy: M) -> Self {
        Self {
            strategy,
            pending: Versioned::default(),
            cached: None,
        }
    }

    pub fn pending(&self) -> &Versioned<KeyedStructure> {
        &self.pending
    }

    /// True when there are edits to save.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn replace_pending(&mut self, draft: KeyedStructure) {
        self.pending.replace(draft);
    }

    /// Record one edited leaf. The draft is copied, never changed in place.
    pub fn stage(&mut self, path: &FieldPath, value: Value) -> Result<(), PathError> {
        let mut next = self.pending.get().clone();
        set_path(&mut next, path, value)?;
        debug!(path = %path, "Staged settings edit");
        self.pending.replace(next);
        Ok(())
    }

    pub fn clear_pending(&mut self) {
        self.pending.replace(KeyedStructure::new());
    }

    /// `merge(base, pending)`, recomputed only when either generation moved.
    pub fn merged_view(&mut self, base: &Versioned<KeyedStructure>) -> MergedView {
        if let Some(cached) = &self.cached {
            if cached.base == base.generation() && cached.pending == self.pending.generation() {
                return Arc::clone(&cached.view);
            }
        }

        let view: MergedView = Arc::new(self.strategy.merge(base.get(), self.pending.get()));
        self.cached = Some(CachedView {
            base: base.generation(),
            pending: self.pending.generation(),
            view: Arc::clone(&view),
        });
        view
    }

    /// Submit the whole draft. Success clears it; failure keeps it for a retry.
    pub async fn save<S>(&mut self, submitter: &S) -> SaveOutcome
    where
        S: SettingsSubmitter + ?Sized,
    {
        let draft = self.pending.shared();
        match submitter.submit(&draft).await {
            Ok(()) => {
                info!(fields = draft.len(), "Settings saved");
                self.clear_pending();
                SaveOutcome::Saved
            }
            Err(e) => {
                warn!(error = %e, "Settings save failed, keeping pending edits");
                SaveOutcome::Failed {
                    messages: e.messages(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::merge::merge;

    fn structure(value: Value) -> KeyedStructure {
        value.as_object().cloned().unwrap()
    }

    /// Records submitted drafts and answers with a canned result.
    struct RecordingSubmitter {
        result: Result<(), SubmitError>,
        submitted: Mutex<Vec<KeyedStructure>>,
    }

    impl RecordingSubmitter {
        fn new(result: Result<(), SubmitError>) -> Self {
            Self {
                result,
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    impl SettingsSubmitter for RecordingSubmitter {
        fn submit<'a>(
            &'a self,
            draft: &'a KeyedStructure,
        ) -> BoxFuture<'a, Result<(), SubmitError>> {
            Box::pin(async move {
                self.submitted.lock().unwrap().push(draft.clone());
                self.result.clone()
            })
        }
    }

    #[test]
    fn test_versioned_identity() {
        let a = Versioned::new(1);
        let b = a.clone();
        let c = Versioned::new(1);
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));

        let mut d = a.clone();
        d.replace(1);
        assert!(!a.same_identity(&d));
        assert_eq!(*d, 1);
    }

    #[test]
    fn test_merged_view_is_base_when_no_edits() {
        let base = Versioned::new(structure(json!({"moderation": "PRE"})));
        let mut overlay = DraftOverlay::new();
        assert!(!overlay.is_dirty());
        assert_eq!(*overlay.merged_view(&base), *base.get());
    }

    #[test]
    fn test_merged_view_recomputed_only_on_generation_change() {
        let calls = Cell::new(0);
        let counting = |base: &KeyedStructure, overlay: &KeyedStructure| {
            calls.set(calls.get() + 1);
            merge(base, overlay)
        };
        let mut overlay = DraftOverlay::with_strategy(counting);
        let base = Versioned::new(structure(json!({"a": 1, "b": [1, 2]})));

        overlay.merged_view(&base);
        overlay.merged_view(&base);
        overlay.merged_view(&base.clone());
        assert_eq!(calls.get(), 1);

        overlay.stage(&FieldPath::new(["b"]), json!([3])).unwrap();
        let view = overlay.merged_view(&base);
        assert_eq!(calls.get(), 2);
        assert_eq!(Value::Object((*view).clone()), json!({"a": 1, "b": [3]}));

        // Same contents, new generation: recompute.
        let refreshed = Versioned::new(base.get().clone());
        overlay.merged_view(&refreshed);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_previous_view_is_never_mutated() {
        let base = Versioned::new(structure(json!({"a": {"x": 1}})));
        let mut overlay = DraftOverlay::new();
        let before = overlay.merged_view(&base);

        overlay.stage(&FieldPath::new(["a", "x"]), json!(2)).unwrap();
        let after = overlay.merged_view(&base);

        assert_eq!(Value::Object((*before).clone()), json!({"a": {"x": 1}}));
        assert_eq!(Value::Object((*after).clone()), json!({"a": {"x": 2}}));
    }

    #[test]
    fn test_stage_copies_draft() {
        let mut overlay = DraftOverlay::new();
        let first = overlay.pending().clone();
        overlay.stage(&FieldPath::new(["wordlist", "banned"]), json!(["x"])).unwrap();

        assert!(first.is_empty());
        assert!(!overlay.pending().same_identity(&first));
        assert_eq!(
            Value::Object(overlay.pending().get().clone()),
            json!({"wordlist": {"banned": ["x"]}})
        );
        assert_eq!(
            overlay.stage(&FieldPath::root(), json!(1)),
            Err(PathError::Empty)
        );
    }

    #[tokio::test]
    async fn test_save_success_clears_draft() {
        let base = Versioned::new(structure(json!({"charCount": 5000, "premod": false})));
        let mut overlay = DraftOverlay::new();
        overlay.stage(&FieldPath::new(["premod"]), json!(true)).unwrap();
        assert_eq!(overlay.merged_view(&base)["premod"], json!(true));

        let submitter = RecordingSubmitter::new(Ok(()));
        let outcome = overlay.save(&submitter).await;

        assert_eq!(outcome, SaveOutcome::Saved);
        assert!(!overlay.is_dirty());
        assert_eq!(
            submitter.submitted.lock().unwrap().as_slice(),
            &[structure(json!({"premod": true}))]
        );
        assert_eq!(*overlay.merged_view(&base), *base.get());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_draft() {
        let base = Versioned::new(structure(json!({"charCount": 5000})));
        let mut overlay = DraftOverlay::new();
        overlay.stage(&FieldPath::new(["charCount"]), json!(-1)).unwrap();
        let pending_before = overlay.pending().clone();

        let submitter = RecordingSubmitter::new(Err(SubmitError::Validation(vec![
            "charCount must be positive".to_string(),
        ])));
        let outcome = overlay.save(&submitter).await;

        assert_eq!(
            outcome,
            SaveOutcome::Failed {
                messages: vec!["charCount must be positive".to_string()]
            }
        );
        assert!(overlay.is_dirty());
        assert!(overlay.pending().same_identity(&pending_before));
        assert_eq!(overlay.merged_view(&base)["charCount"], json!(-1));
    }

    #[test]
    fn test_save_outcome_serde() {
        assert_eq!(
            serde_json::to_value(SaveOutcome::Saved).unwrap(),
            json!({"status": "saved"})
        );
        assert_eq!(
            serde_json::to_value(SaveOutcome::Failed {
                messages: vec!["x".into()]
            })
            .unwrap(),
            json!({"status": "failed", "messages": ["x"]})
        );
    }
}
