use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Field path is empty")]
    Empty,

    #[error("Field path has an empty segment: {0}")]
    EmptySegment(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid variables for mutation {mutation}: {source}")]
    InvalidVariables {
        mutation: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure reported by the collaborator that submits a settings draft.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The draft could not be submitted, or the server failed it without
    /// field messages.
    #[error("Save failed: {0}")]
    Failed(String),
}

impl SubmitError {
    /// Human-readable messages suitable for a notification.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SubmitError::Validation(messages) if !messages.is_empty() => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authorized")]
    NotAuthorized,
}

impl AuthzError {
    /// HTTP status the request gate answers with.
    pub fn status(&self) -> u16 {
        match self {
            AuthzError::NotAuthorized => 401,
        }
    }
}
