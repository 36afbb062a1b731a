//! Mutation-to-cache-update dispatch.
//!
//! After a mutation succeeds, the client asks the [`UpdateRegistry`] which
//! cached queries the mutation affects and how. The answer is an
//! [`UpdateQueries`] set: one transform per query name, each taking the
//! previously cached result and returning its replacement. Transforms are
//! pure and synchronous; they filter or overwrite, never reorder, and never
//! touch the network.
//!
//! Built-in handlers:
//! - `SetUserStatus`: an approving status drops the user from the
//!   moderation listing, any other status leaves it as is
//! - `RejectUsername`: always drops the user from the moderation listing
//! - `UpdateSettings`: overwrites every settings leaf named in the input
//!
//! An unregistered mutation yields a passthrough set whose transforms are
//! all identity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::DispatchError;
use crate::keyed::{FieldPath, KeyedStructure};
use crate::patch::{apply_patch, remove_by_id, Patch};

/// Replacement function for one cached query result.
pub type QueryTransform = Arc<dyn Fn(KeyedStructure) -> KeyedStructure + Send + Sync>;

fn identity() -> QueryTransform {
    Arc::new(|prev| prev)
}

// ============================================================================
// Update sets
// ============================================================================

/// Per-query transforms produced for one mutation.
#[derive(Clone, Default)]
pub struct UpdateQueries {
    transforms: Vec<(String, QueryTransform)>,
    passthrough: bool,
}

impl UpdateQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set returned for mutations nothing is registered for.
    pub fn passthrough() -> Self {
        Self {
            transforms: Vec::new(),
            passthrough: true,
        }
    }

    /// Add (or replace) the transform for `query`.
    pub fn with<F>(mut self, query: impl Into<String>, transform: F) -> Self
    where
        F: Fn(KeyedStructure) -> KeyedStructure + Send + Sync + 'static,
    {
        let query = query.into();
        let transform: QueryTransform = Arc::new(transform);
        match self.transforms.iter_mut().find(|(name, _)| *name == query) {
            Some(slot) => slot.1 = transform,
            None => self.transforms.push((query, transform)),
        }
        self
    }

    pub fn with_patch(self, query: impl Into<String>, patch: Patch) -> Self {
        self.with(query, move |prev| apply_patch(prev, &patch))
    }

    /// True when the mutation was unknown and nothing could be inferred.
    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.transforms.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, query: &str) -> Option<&QueryTransform> {
        self.transforms
            .iter()
            .find(|(name, _)| name == query)
            .map(|(_, transform)| transform)
    }

    /// Transform for `query`; identity for queries this set does not name.
    pub fn transform_for(&self, query: &str) -> QueryTransform {
        self.get(query).cloned().unwrap_or_else(identity)
    }

    pub fn apply(&self, query: &str, prev: KeyedStructure) -> KeyedStructure {
        match self.get(query) {
            Some(transform) => transform(prev),
            None => prev,
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl fmt::Debug for UpdateQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQueries")
            .field("queries", &self.queries().collect::<Vec<_>>())
            .field("passthrough", &self.passthrough)
            .finish()
    }
}

// ============================================================================
// Mutation variables
// ============================================================================

/// Moderation status of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserStatus {
    Active,
    Banned,
    Pending,
    Approved,
    Other(String),
}

impl UserStatus {
    pub fn as_str(&self) -> &str {
        match self {
            UserStatus::Active => "ACTIVE",
            UserStatus::Banned => "BANNED",
            UserStatus::Pending => "PENDING",
            UserStatus::Approved => "APPROVED",
            UserStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for UserStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "ACTIVE" => UserStatus::Active,
            "BANNED" => UserStatus::Banned,
            "PENDING" => UserStatus::Pending,
            "APPROVED" => UserStatus::Approved,
            _ => UserStatus::Other(raw),
        }
    }
}

impl From<&str> for UserStatus {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<UserStatus> for String {
    fn from(status: UserStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetUserStatusVariables {
    status: UserStatus,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RejectUsernameVariables {
    input: IdInput,
}

#[derive(Debug, Deserialize)]
struct IdInput {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UpdateSettingsVariables {
    input: KeyedStructure,
}

fn decode<T: DeserializeOwned>(mutation: &str, variables: &KeyedStructure) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(variables.clone())).map_err(|source| {
        DispatchError::InvalidVariables {
            mutation: mutation.to_string(),
            source,
        }
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Builds the update set for one mutation from its variables.
pub trait MutationHandler: Send + Sync {
    fn updates(&self, variables: &KeyedStructure) -> Result<UpdateQueries, DispatchError>;
}

impl<F> MutationHandler for F
where
    F: Fn(&KeyedStructure) -> Result<UpdateQueries, DispatchError> + Send + Sync,
{
    fn updates(&self, variables: &KeyedStructure) -> Result<UpdateQueries, DispatchError> {
        self(variables)
    }
}

/// The mutations handled out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum MutationKind {
    SetUserStatus,
    RejectUsername,
    UpdateSettings,
}

impl MutationKind {
    pub const ALL: [MutationKind; 3] = [
        MutationKind::SetUserStatus,
        MutationKind::RejectUsername,
        MutationKind::UpdateSettings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::SetUserStatus => "SetUserStatus",
            MutationKind::RejectUsername => "RejectUsername",
            MutationKind::UpdateSettings => "UpdateSettings",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The built-in handler for this mutation, configured from `config`.
    pub fn handler(&self, config: &Config) -> Arc<dyn MutationHandler> {
        match self {
            MutationKind::SetUserStatus => Arc::new(SetUserStatusHandler {
                query: config.community_query.clone(),
                listing: config.listing_path.clone(),
                removing: config.removing_statuses.clone(),
            }),
            MutationKind::RejectUsername => Arc::new(RejectUsernameHandler {
                query: config.community_query.clone(),
                listing: config.listing_path.clone(),
            }),
            MutationKind::UpdateSettings => Arc::new(UpdateSettingsHandler {
                query: config.configure_query.clone(),
                settings_field: config.settings_field.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetUserStatusHandler {
    query: String,
    listing: FieldPath,
    removing: Vec<UserStatus>,
}

impl MutationHandler for SetUserStatusHandler {
    fn updates(&self, variables: &KeyedStructure) -> Result<UpdateQueries, DispatchError> {
        let vars: SetUserStatusVariables = decode(MutationKind::SetUserStatus.name(), variables)?;
        if !self.removing.contains(&vars.status) {
            debug!(
                status = %vars.status,
                user_id = %vars.user_id,
                "Status does not change listing membership"
            );
            return Ok(UpdateQueries::new().with(self.query.clone(), |prev| prev));
        }
        Ok(UpdateQueries::new().with_patch(
            self.query.clone(),
            remove_by_id(&self.listing, vars.user_id),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct RejectUsernameHandler {
    query: String,
    listing: FieldPath,
}

impl MutationHandler for RejectUsernameHandler {
    fn updates(&self, variables: &KeyedStructure) -> Result<UpdateQueries, DispatchError> {
        let vars: RejectUsernameVariables = decode(MutationKind::RejectUsername.name(), variables)?;
        Ok(UpdateQueries::new().with_patch(
            self.query.clone(),
            remove_by_id(&self.listing, vars.input.id),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct UpdateSettingsHandler {
    query: String,
    settings_field: String,
}

impl MutationHandler for UpdateSettingsHandler {
    fn updates(&self, variables: &KeyedStructure) -> Result<UpdateQueries, DispatchError> {
        let vars: UpdateSettingsVariables = decode(MutationKind::UpdateSettings.name(), variables)?;
        let patch = Patch::at(
            &FieldPath::new([self.settings_field.as_str()]),
            Patch::set_leaves(&vars.input),
        );
        Ok(UpdateQueries::new().with_patch(self.query.clone(), patch))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Mutation name to handler table.
#[derive(Clone)]
pub struct UpdateRegistry {
    handlers: HashMap<String, Arc<dyn MutationHandler>>,
}

impl UpdateRegistry {
    /// An empty registry; every mutation passes through.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The built-in handlers with default configuration.
    pub fn builtin() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for kind in MutationKind::ALL {
            registry
                .handlers
                .insert(kind.name().to_string(), kind.handler(config));
        }
        registry
    }

    /// Register `handler` for `mutation`, replacing any previous handler.
    pub fn register<H>(&mut self, mutation: impl Into<String>, handler: H) -> &mut Self
    where
        H: MutationHandler + 'static,
    {
        self.handlers.insert(mutation.into(), Arc::new(handler));
        self
    }

    pub fn contains(&self, mutation: &str) -> bool {
        self.handlers.contains_key(mutation)
    }

    /// Registered mutation names, sorted.
    pub fn mutations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn dispatch(
        &self,
        mutation: &str,
        variables: &KeyedStructure,
    ) -> Result<UpdateQueries, DispatchError> {
        match self.handlers.get(mutation) {
            Some(handler) => handler.updates(variables),
            None => {
                debug!(mutation, "No cache updates registered, passing cache through");
                Ok(UpdateQueries::passthrough())
            }
        }
    }
}

impl Default for UpdateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for UpdateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRegistry")
            .field("mutations", &self.mutations())
            .finish()
    }
}
