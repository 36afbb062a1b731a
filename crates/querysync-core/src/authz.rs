//! Role gate applied before any reconciliation request is served.
//!
//! A request proceeds only when there is a user and that user holds every
//! required role.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthzError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    pub fn has_roles(&self, required: &[&str]) -> bool {
        has_roles(&self.roles, required)
    }
}

/// True when `user_roles` contains every role in `required`.
pub fn has_roles<S: AsRef<str>>(user_roles: &[S], required: &[&str]) -> bool {
    required
        .iter()
        .all(|role| user_roles.iter().any(|held| held.as_ref() == *role))
}

pub fn require(user: Option<&User>, required: &[&str]) -> Result<(), AuthzError> {
    let Some(user) = user else {
        debug!(target: "querysync::authz", "No user on request, returning {}", AuthzError::NotAuthorized);
        return Err(AuthzError::NotAuthorized);
    };

    if !user.has_roles(required) {
        debug!(
            target: "querysync::authz",
            user = %user.id,
            required = ?required,
            "User does not have all the required roles"
        );
        return Err(AuthzError::NotAuthorized);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(roles: &[&str]) -> User {
        User {
            id: "u1".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_has_roles_requires_all() {
        assert!(has_roles(&["ADMIN", "MODERATOR"], &["ADMIN"]));
        assert!(has_roles(&["ADMIN", "MODERATOR"], &["MODERATOR", "ADMIN"]));
        assert!(!has_roles(&["MODERATOR"], &["ADMIN", "MODERATOR"]));
        assert!(has_roles::<&str>(&[], &[]));
    }

    #[test]
    fn test_require_without_user() {
        assert_eq!(require(None, &[]), Err(AuthzError::NotAuthorized));
    }

    #[test]
    fn test_require_with_roles() {
        let admin = user(&["ADMIN"]);
        assert_eq!(require(Some(&admin), &["ADMIN"]), Ok(()));
        assert_eq!(require(Some(&admin), &[]), Ok(()));

        let err = require(Some(&admin), &["ADMIN", "MODERATOR"]).unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn test_user_roles_default_to_empty() {
        let parsed: User = serde_json::from_str(r#"{"id": "u9"}"#).unwrap();
        assert!(parsed.roles.is_empty());
        assert!(!parsed.has_roles(&["ADMIN"]));
    }
}
