// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::{Validate, ValidationError};

use super::{trimmed, trimmed_opt};

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static username pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Unique, stored lower-cased.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub bio: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub reputation: i64,
    pub post_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub const USER_COLUMNS: &str =
    "id, username, email, password, bio, avatar_url, role, reputation, post_count, created_at";

/// The public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_admin: bool,
    pub reputation: i64,
    pub post_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            avatar_url: user.avatar_url,
            is_admin: user.role == Role::Admin,
            role: user.role,
            reputation: user.reputation,
            post_count: user.post_count,
            created_at: user.created_at,
        }
    }
}

/// Token plus the signed-in user, returned by register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: UserResponse,
}

pub const BIO_MAX_CHARS: usize = 500;

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new("username_chars")
            .with_message("Username may only contain letters, digits and underscores.".into()));
    }
    Ok(())
}

fn validate_avatar_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Ok(());
    }
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("avatar_url")
            .with_message("Avatar must be an http(s) URL.".into())),
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(
        length(
            min = 3,
            max = 32,
            message = "Username length must be between 3 and 32 characters."
        ),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,

    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,

    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    pub bio: Option<String>,
}

/// DTO for user login. The identifier is either a username or an email.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email", deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 254, message = "Username or email is required."))]
    pub identifier: String,

    #[validate(length(min = 1, max = 128, message = "Password is required."))]
    pub password: String,
}

/// DTO for `PATCH /api/me`. Absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        length(
            min = 3,
            max = 32,
            message = "Username length must be between 3 and 32 characters."
        ),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(email(message = "A valid email address is required."))]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    pub bio: Option<String>,

    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(
        length(max = 2048, message = "Avatar URL is too long."),
        custom(function = "validate_avatar_url")
    )]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        serde_json::from_value(serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        }))
        .unwrap()
    }

    #[test]
    fn register_request_trims_and_validates() {
        let req = register("  alice_1 ", " alice@example.com ", "secret123");
        assert_eq!(req.username, "alice_1");
        assert_eq!(req.email, "alice@example.com");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn register_request_rejects_bad_fields() {
        assert!(register("al", "a@example.com", "secret123").validate().is_err());
        assert!(register("bad name", "a@example.com", "secret123").validate().is_err());
        assert!(register("alice", "not-an-email", "secret123").validate().is_err());
        assert!(register("alice", "a@example.com", "123").validate().is_err());
    }

    #[test]
    fn login_accepts_username_or_email_keys() {
        let by_name: LoginRequest =
            serde_json::from_value(serde_json::json!({"username": "bob", "password": "pw"}))
                .unwrap();
        let by_email: LoginRequest =
            serde_json::from_value(serde_json::json!({"email": "b@x.io", "password": "pw"}))
                .unwrap();
        assert_eq!(by_name.identifier, "bob");
        assert_eq!(by_email.identifier, "b@x.io");
    }

    #[test]
    fn avatar_url_must_be_http() {
        assert!(validate_avatar_url("https://cdn.example.com/a.png").is_ok());
        assert!(validate_avatar_url("").is_ok());
        assert!(validate_avatar_url("javascript:alert(1)").is_err());
        assert!(validate_avatar_url("not a url").is_err());
    }

    #[test]
    fn public_view_hides_password_and_flags_admin() {
        let user = User {
            id: 1,
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password: "$argon2id$secret".to_string(),
            bio: String::new(),
            avatar_url: None,
            role: Role::Admin,
            reputation: 0,
            post_count: 0,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["is_admin"], true);
        assert_eq!(json["role"], "admin");
    }
}
