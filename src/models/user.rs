//! User model and related types

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ClientError, ClientResult};

/// Account role as reported by `auth/me/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MEMBER" => Ok(Role::Member),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Profile of the authenticated user.
///
/// `is_staff` and `is_superuser` are carried as reported. Route gating only
/// looks at `role`; the API already reports staff and superusers as `ADMIN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the legacy Django flags claim admin rights, whatever `role` says
    pub fn has_admin_flags(&self) -> bool {
        self.is_staff || self.is_superuser
    }
}

/// Login request body. The API authenticates by email.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request body, also used to add a librarian
#[derive(Debug, Clone, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Account as echoed back by `auth/register/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

/// Answer of `auth/add-librarian/`. The echoed role is the serializer
/// default, not the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarianAdded {
    pub message: String,
    pub user: RegisteredUser,
}

impl RegisterRequest {
    /// Build a request from a sign-up form, applying the form's checks
    pub fn from_form(
        email: &str,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> ClientResult<Self> {
        if email.is_empty() || username.is_empty() || password.is_empty() || confirm_password.is_empty() {
            return Err(ClientError::InvalidInput("All fields are required".to_string()));
        }
        if password != confirm_password {
            return Err(ClientError::InvalidInput("Passwords do not match".to_string()));
        }

        let request = Self {
            email: email.trim().to_string(),
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        request.validate()?;
        Ok(request)
    }
}
