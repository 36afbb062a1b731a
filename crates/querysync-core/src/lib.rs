//! querysync-core - keeps cached query results consistent after mutations.
//!
//! This crate provides:
//! - `leaves`: deep leaf mapping over keyed structures
//! - `merge`: settings merge that replaces arrays wholesale
//! - `draft`: pending settings edits merged over server settings, with save
//! - `dispatch`: mutation name to per-query cache update table
//! - `cache`: in-memory holder of named query results
//! - `authz`: role gate for incoming requests
//!
//! Cached results are `serde_json` object maps with insertion-ordered keys.

pub mod authz;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod keyed;
pub mod leaves;
pub mod merge;
pub mod patch;

pub use cache::QueryCache;
pub use config::Config;
pub use dispatch::{
    MutationHandler, MutationKind, QueryTransform, UpdateQueries, UpdateRegistry, UserStatus,
};
pub use draft::{DraftOverlay, Generation, MergedView, SaveOutcome, SettingsSubmitter, Versioned};
pub use error::{AuthzError, DispatchError, PathError, SubmitError};
pub use keyed::{FieldPath, KeyedStructure, Node, NodeKind};
pub use leaves::{fold_leaves, leaves, map_leaves};
pub use merge::{merge, ExcludingArrays, MergeStrategy};
pub use patch::{apply_patch, Patch};
