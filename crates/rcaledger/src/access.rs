//! Roles, users and the request-scoped context.
//!
//! Every mutating ledger call takes a [`RequestContext`], produced by a
//! successful login, instead of reading ambient session state.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Access role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operations user: track, submit, view service-center summary.
    User,
    /// Administrator: everything a user can do, plus export, analytics and user management.
    Admin,
    /// Same capabilities as admin.
    SuperAdmin,
}

impl Role {
    /// Whether this role is one of the elevated roles.
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
            Self::SuperAdmin => write!(f, "superadmin"),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::SuperAdmin),
            other => Err(Error::validation(
                "role",
                format!("unknown role '{other}' (expected user, admin or superadmin)"),
            )),
        }
    }
}

/// Identity and role of the caller for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Email of the logged-in user; written to `updated_by` / `deleted_by`.
    pub identity: String,
    /// Display name.
    pub name: String,
    /// Role the user logged in with.
    pub role: Role,
}

impl RequestContext {
    /// Build a context directly, bypassing login.
    #[must_use]
    pub fn new(identity: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            name: name.into(),
            role,
        }
    }

    /// Require an elevated role for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for plain users.
    pub fn require_elevated(&self, action: &'static str) -> Result<()> {
        if self.role.is_elevated() {
            Ok(())
        } else {
            Err(Error::permission_denied(self.role, action))
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login email; unique.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Access role.
    pub role: Role,
    /// BLAKE3 digest of the password.
    #[serde(skip_serializing, default)]
    pub password_digest: String,
    /// When the account was created.
    pub created_on: DateTime<Utc>,
}

impl User {
    /// Create a user, digesting the password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if email, name or password is blank.
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        role: Role,
        password: &str,
    ) -> Result<Self> {
        let email = email.into().trim().to_string();
        let name = name.into().trim().to_string();
        if email.is_empty() {
            return Err(Error::validation("email", "must not be empty"));
        }
        if !email.contains('@') {
            return Err(Error::validation("email", format!("'{email}' is not an email address")));
        }
        if name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        if password.is_empty() {
            return Err(Error::validation("password", "must not be empty"));
        }
        Ok(Self {
            email,
            name,
            role,
            password_digest: password_digest(password),
            created_on: Utc::now(),
        })
    }

    /// Check a candidate password against the stored digest.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        self.password_digest == password_digest(password)
    }

    /// Context for requests made as this user.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        RequestContext::new(&self.email, &self.name, self.role)
    }
}

/// One successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginEvent {
    /// Audit sequence number (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Who logged in.
    pub email: String,
    /// Role at login time.
    pub role: Role,
    /// When.
    pub login_time: DateTime<Utc>,
}

impl LoginEvent {
    /// Audit row for `ctx` logging in now.
    #[must_use]
    pub fn now(ctx: &RequestContext) -> Self {
        Self {
            id: None,
            email: ctx.identity.clone(),
            role: ctx.role,
            login_time: Utc::now(),
        }
    }
}

/// Hex BLAKE3 digest of a password.
#[must_use]
pub fn password_digest(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display_and_parse() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!("SuperAdmin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("guest".parse::<Role>().unwrap_err().is_validation());
    }

    #[test]
    fn test_role_is_elevated() {
        assert!(!Role::User.is_elevated());
        assert!(Role::Admin.is_elevated());
        assert!(Role::SuperAdmin.is_elevated());
    }

    #[test]
    fn test_require_elevated() {
        let user = RequestContext::new("u@example.com", "U", Role::User);
        let err = user.require_elevated("export records").unwrap_err();
        assert!(err.is_permission_error());

        let admin = RequestContext::new("a@example.com", "A", Role::Admin);
        assert!(admin.require_elevated("export records").is_ok());
    }

    #[test]
    fn test_user_new_digests_password() {
        let user = User::new(" ops@example.com ", "Ops", Role::User, "hunter2").unwrap();
        assert_eq!(user.email, "ops@example.com");
        assert_ne!(user.password_digest, "hunter2");
        assert!(user.verify_password("hunter2"));
        assert!(!user.verify_password("hunter3"));
    }

    #[test]
    fn test_user_new_rejects_blank_fields() {
        assert!(User::new("", "Ops", Role::User, "pw").is_err());
        assert!(User::new("not-an-email", "Ops", Role::User, "pw").is_err());
        assert!(User::new("ops@example.com", " ", Role::User, "pw").is_err());
        assert!(User::new("ops@example.com", "Ops", Role::User, "").is_err());
    }

    #[test]
    fn test_user_serialization_hides_digest() {
        let user = User::new("ops@example.com", "Ops", Role::Admin, "pw").unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_digest"));
        assert!(json.contains("\"admin\""));
    }

    #[test]
    fn test_login_event_now() {
        let ctx = RequestContext::new("a@example.com", "A", Role::SuperAdmin);
        let event = LoginEvent::now(&ctx);
        assert_eq!(event.email, "a@example.com");
        assert_eq!(event.role, Role::SuperAdmin);
        assert!(event.id.is_none());
    }

    #[test]
    fn test_password_digest_is_stable() {
        assert_eq!(password_digest("x"), password_digest("x"));
        assert_ne!(password_digest("x"), password_digest("y"));
        assert_eq!(password_digest("x").len(), 64);
    }
}
