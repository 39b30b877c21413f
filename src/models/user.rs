// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// Username reserved for the self-service endpoint (`/users/me`).
pub const RESERVED_USERNAME: &str = "me";

/// Characters allowed in a stored username.
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid")
});

/// Stricter charset accepted at signup.
static SIGNUP_USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-a-zA-Z0-9_]+$").expect("signup username pattern is valid")
});

/// Coarse-grained trust tier of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn is_moderator(self) -> bool {
        matches!(self, Role::Moderator)
    }

    /// Moderators and admins may edit or delete content authored by others.
    pub fn can_moderate(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique e-mail address; confirmation codes are sent here.
    pub email: String,

    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,

    pub role: Role,

    /// Argon2 digest of the outstanding confirmation code, empty once redeemed.
    pub confirmation_code: String,

    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,

    pub date_joined: chrono::DateTime<chrono::Utc>,
}

/// Column list matching `User`, shared by every query that loads a user.
pub const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, \
     confirmation_code, is_active, is_staff, is_superuser, date_joined";

/// Public representation of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: Role,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

/// DTO for `POST /auth/signup`.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters."),
        custom(function = validate_signup_username)
    )]
    pub username: String,

    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: String,
}

/// DTO for `POST /auth/token`.
#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub confirmation_code: String,
}

/// DTO for an administrator creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters."),
        custom(function = validate_username)
    )]
    pub username: String,

    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: String,

    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,

    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,

    #[validate(length(max = 256))]
    pub bio: Option<String>,

    #[serde(default)]
    pub role: Role,
}

/// DTO for partially updating a user. Fields are optional.
///
/// `role` is honoured only on the administrative endpoint; `/users/me`
/// discards it.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 1, max = 150, message = "Username must be between 1 and 150 characters."),
        custom(function = validate_username)
    )]
    pub username: Option<String>,

    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(length(max = 256))]
    pub bio: Option<String>,

    pub role: Option<Role>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.bio.is_none()
            && self.role.is_none()
    }
}

/// Query parameters for listing users.
#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub page: Option<u32>,
    /// Partial match on username.
    pub search: Option<String>,
}

fn reject_reserved(username: &str) -> Result<(), ValidationError> {
    if username == RESERVED_USERNAME {
        return Err(ValidationError::new("reserved_username")
            .with_message(format!("Username \"{}\" is not allowed.", RESERVED_USERNAME).into()));
    }
    Ok(())
}

/// Validates a stored username: word characters plus `.@+-`, never `me`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new("invalid_username").with_message(
            "Username may contain only letters, digits and @/./+/-/_ characters.".into(),
        ));
    }
    reject_reserved(username)
}

/// Validates a username submitted at signup: ASCII letters, digits, `-` and `_`.
pub fn validate_signup_username(username: &str) -> Result<(), ValidationError> {
    if !SIGNUP_USERNAME_RE.is_match(username) {
        return Err(ValidationError::new("invalid_username").with_message(
            "Username may contain only latin letters, digits, '-' and '_'.".into(),
        ));
    }
    reject_reserved(username)
}
