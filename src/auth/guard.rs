//! Authorization guard.
//!
//! Every role or ownership decision in the admin surface goes through
//! [`authorize`]. It is a pure function of the actor and the requirement, so
//! it can run before any mutation starts.

use crate::models::user::{Role, User};
use serde::{Deserialize, Serialize};

/// The identity behind the current request, as resolved from the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub verified: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            role: user.role,
            verified: user.verified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement<'a> {
    RequireRole(Role),
    /// Denies the request when the actor is the target of the operation.
    ForbidSelf(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    InvalidOperation(String),
}

pub fn authorize(actor: Option<&Actor>, requirement: Requirement<'_>) -> Result<(), AuthzError> {
    let actor = actor.ok_or(AuthzError::Unauthorized)?;

    match requirement {
        Requirement::RequireRole(role) => {
            if actor.role != role {
                return Err(AuthzError::Unauthorized);
            }
        }
        Requirement::ForbidSelf(target_id) => {
            if actor.id == target_id {
                return Err(AuthzError::InvalidOperation(
                    "You cannot perform this action on your own account".to_string(),
                ));
            }
        }
    }

    Ok(())
}

/// Evaluates requirements in order and stops at the first denial.
pub fn authorize_all(
    actor: Option<&Actor>,
    requirements: &[Requirement<'_>],
) -> Result<(), AuthzError> {
    requirements
        .iter()
        .try_for_each(|requirement| authorize(actor, *requirement))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(id: &str, role: Role) -> Actor {
        Actor {
            id: id.to_string(),
            role,
            verified: true,
        }
    }

    #[test]
    fn test_missing_actor_is_unauthorized() {
        assert_eq!(
            authorize(None, Requirement::RequireRole(Role::Admin)),
            Err(AuthzError::Unauthorized)
        );
        assert_eq!(
            authorize(None, Requirement::ForbidSelf("u1")),
            Err(AuthzError::Unauthorized)
        );
    }

    #[test]
    fn test_require_role() {
        let admin = actor("a1", Role::Admin);
        let teacher = actor("t1", Role::Teacher);
        let student = actor("s1", Role::Student);

        assert!(authorize(Some(&admin), Requirement::RequireRole(Role::Admin)).is_ok());
        assert_eq!(
            authorize(Some(&teacher), Requirement::RequireRole(Role::Admin)),
            Err(AuthzError::Unauthorized)
        );
        assert_eq!(
            authorize(Some(&student), Requirement::RequireRole(Role::Admin)),
            Err(AuthzError::Unauthorized)
        );
    }

    #[test]
    fn test_forbid_self() {
        let admin = actor("a1", Role::Admin);

        assert!(authorize(Some(&admin), Requirement::ForbidSelf("u2")).is_ok());
        assert!(matches!(
            authorize(Some(&admin), Requirement::ForbidSelf("a1")),
            Err(AuthzError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_authorize_all_stops_at_first_denial() {
        let teacher = actor("t1", Role::Teacher);

        // role check comes first, so a non-admin targeting itself is Unauthorized
        let result = authorize_all(
            Some(&teacher),
            &[Requirement::RequireRole(Role::Admin), Requirement::ForbidSelf("t1")],
        );
        assert_eq!(result, Err(AuthzError::Unauthorized));

        let admin = actor("a1", Role::Admin);
        let result = authorize_all(
            Some(&admin),
            &[Requirement::RequireRole(Role::Admin), Requirement::ForbidSelf("a1")],
        );
        assert!(matches!(result, Err(AuthzError::InvalidOperation(_))));

        assert!(authorize_all(Some(&admin), &[]).is_ok());
    }
}
