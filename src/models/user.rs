use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role '{0}': expected one of student, teacher, admin")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// Stored user record. Carries the password hash and the verification token,
/// so it is never serialized directly; handlers return [`PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub verification_token: Option<String>,
    pub verification_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            verified: user.verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Insert payload. The repository assigns `id` and both timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

/// Restricted field set accepted by `UserService::update_user`.
///
/// `id` and `email` have no slot here; `from_json` rejects payloads naming them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub role: Option<Role>,
    pub verified: Option<bool>,
    /// `Some(None)` clears the token.
    pub verification_token: Option<Option<String>>,
    /// `Some(None)` clears the expiry.
    pub verification_token_expires_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserUpdateError {
    #[error("Field '{0}' cannot be modified")]
    ImmutableField(String),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.verified.is_none()
            && self.verification_token.is_none()
            && self.verification_token_expires_at.is_none()
    }

    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    /// Marks the user verified and clears the token in the same write.
    pub fn mark_verified() -> Self {
        Self {
            verified: Some(true),
            verification_token: Some(None),
            verification_token_expires_at: Some(None),
            ..Self::default()
        }
    }

    pub fn clear_token() -> Self {
        Self {
            verification_token: Some(None),
            verification_token_expires_at: Some(None),
            ..Self::default()
        }
    }

    pub fn set_token(token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            verification_token: Some(Some(token)),
            verification_token_expires_at: Some(Some(expires_at)),
            ..Self::default()
        }
    }

    /// Builds an update from a loosely typed partial document, the shape
    /// admin tooling sends. Identity fields are refused outright.
    pub fn from_json(fields: &serde_json::Map<String, serde_json::Value>) -> Result<Self, UserUpdateError> {
        let mut update = UserUpdate::default();

        for (key, value) in fields {
            match key.as_str() {
                "id" | "email" => return Err(UserUpdateError::ImmutableField(key.clone())),
                "role" => {
                    let raw = value.as_str().ok_or_else(|| invalid(key, "expected a string"))?;
                    let role = raw.parse::<Role>().map_err(|e| invalid(key, &e.to_string()))?;
                    update.role = Some(role);
                }
                "verified" => {
                    let verified = value.as_bool().ok_or_else(|| invalid(key, "expected a boolean"))?;
                    update.verified = Some(verified);
                }
                "verificationToken" | "verification_token" => {
                    let token = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s.clone()),
                        _ => return Err(invalid(key, "expected a string or null")),
                    };
                    update.verification_token = Some(token);
                }
                "verificationTokenExpiresAt" | "verification_token_expires_at" => {
                    let expires_at = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(
                            DateTime::parse_from_rfc3339(s)
                                .map_err(|e| invalid(key, &e.to_string()))?
                                .with_timezone(&Utc),
                        ),
                        _ => return Err(invalid(key, "expected an RFC 3339 timestamp or null")),
                    };
                    update.verification_token_expires_at = Some(expires_at);
                }
                other => return Err(UserUpdateError::UnknownField(other.to_string())),
            }
        }

        Ok(update)
    }
}

fn invalid(field: &str, reason: &str) -> UserUpdateError {
    UserUpdateError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Listing predicate. `None` means "all" for that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub verified: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("teacher".parse::<Role>(), Ok(Role::Teacher));
        assert!("Admin".parse::<Role>().is_err());
        assert!("superuser".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Student);
    }

    #[test]
    fn test_update_rejects_identity_fields() {
        let err = UserUpdate::from_json(&fields(json!({"email": "x@example.com"}))).unwrap_err();
        assert_eq!(err, UserUpdateError::ImmutableField("email".to_string()));

        let err = UserUpdate::from_json(&fields(json!({"role": "admin", "id": "abc"}))).unwrap_err();
        assert_eq!(err, UserUpdateError::ImmutableField("id".to_string()));
    }

    #[test]
    fn test_update_parses_allowed_fields() {
        let update = UserUpdate::from_json(&fields(json!({
            "role": "teacher",
            "verified": false,
            "verificationToken": null
        })))
        .unwrap();

        assert_eq!(update.role, Some(Role::Teacher));
        assert_eq!(update.verified, Some(false));
        assert_eq!(update.verification_token, Some(None));
        assert_eq!(update.verification_token_expires_at, None);
    }

    #[test]
    fn test_update_rejects_unknown_and_malformed() {
        assert!(matches!(
            UserUpdate::from_json(&fields(json!({"password_hash": "x"}))),
            Err(UserUpdateError::UnknownField(_))
        ));
        assert!(matches!(
            UserUpdate::from_json(&fields(json!({"role": "owner"}))),
            Err(UserUpdateError::InvalidValue { .. })
        ));
        assert!(matches!(
            UserUpdate::from_json(&fields(json!({"verified": "yes"}))),
            Err(UserUpdateError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_public_user_has_no_secrets() {
        let now = Utc::now();
        let user = User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            name: None,
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Student,
            verified: false,
            verification_token: Some("tok".to_string()),
            verification_token_expires_at: Some(now),
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(PublicUser::from(user)).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("password_hash"));
        assert!(!object.contains_key("verification_token"));
        assert!(!value.to_string().contains("secret"));
        assert!(!value.to_string().contains("tok"));
    }
}
