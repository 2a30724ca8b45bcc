// src/handlers/auth.rs

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    db::is_unique_violation,
    error::AppError,
    models::user::{AuthResponse, BIO_MAX_CHARS, LoginRequest, RegisterRequest, USER_COLUMNS, User},
    utils::{
        hash::{hash_password, verify_password},
        html::clean_bounded,
        jwt::{bearer_token, now_secs, sign_jwt, verify_jwt},
        validated::ValidatedJson,
    },
};

const DUPLICATE_IDENTITY: &str = "Username or email already exists";
const INVALID_CREDENTIALS: &str = "Invalid credentials";

fn issue_token(user: User, config: &Config) -> Result<AuthResponse, AppError> {
    let token = sign_jwt(user.id, user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(AuthResponse {
        token,
        token_type: "Bearer",
        expires_in: config.jwt_expiration,
        user: user.into(),
    })
}

/// Registers a new user and signs them in.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a token and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.to_lowercase();

    let taken = sqlx::query("SELECT 1 FROM users WHERE username = ? OR email = ?")
        .bind(&payload.username)
        .bind(&email)
        .fetch_optional(&pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict(DUPLICATE_IDENTITY.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let bio = payload
        .bio
        .as_deref()
        .map(|b| clean_bounded(b, "Bio", BIO_MAX_CHARS))
        .transpose()?
        .unwrap_or_default();

    let sql = format!(
        "INSERT INTO users (username, email, password, bio) VALUES (?, ?, ?, ?) RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(&payload.username)
        .bind(&email)
        .bind(&hashed_password)
        .bind(&bio)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration.
            if is_unique_violation(&e) {
                AppError::Conflict(DUPLICATE_IDENTITY.to_string())
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })?;

    tracing::info!(user_id = user.id, "Registered user {}", user.username);

    Ok((StatusCode::CREATED, Json(issue_token(user, &config)?)))
}

/// Authenticates a user by username or email and returns a JWT token.
///
/// Unknown identifiers and wrong passwords are indistinguishable to the caller.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ? OR email = ?");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(&payload.identifier)
        .bind(payload.identifier.to_lowercase())
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or_else(|| AppError::AuthError(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        tracing::info!(user_id = user.id, "Rejected login with wrong password");
        return Err(AppError::AuthError(INVALID_CREDENTIALS.to_string()));
    }

    Ok(Json(issue_token(user, &config)?))
}

/// Revokes the presented token.
///
/// Idempotent: a missing, invalid, expired or already revoked token still
/// answers `{ "success": true }`.
pub async fn logout(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let claims = bearer_token(&headers).and_then(|token| verify_jwt(token, &config.jwt_secret).ok());

    if let Some(claims) = claims {
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?, ?)")
            .bind(&claims.jti)
            .bind(claims.exp as i64)
            .execute(&pool)
            .await?;

        tracing::debug!("Revoked token {}", claims.jti);
    }

    // verify_jwt rejects anything past `exp`, so these rows are dead weight.
    sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
        .bind(now_secs()? as i64)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "success": true })))
}
