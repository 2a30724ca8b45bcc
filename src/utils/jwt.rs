// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{error::AppError, models::user::Role, state::AppState};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Role at issue time. Authorization re-reads the role from the store.
    pub role: Role,
    /// Token id, recorded in `revoked_tokens` on logout.
    pub jti: String,
    /// Issued-at as Unix timestamp.
    pub iat: usize,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))
    }
}

/// The resolved caller of an authenticated request.
///
/// Inserted into request extensions by [`auth_middleware`]; handlers take it
/// as `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner-or-admin gate applied before deleting posts and comments.
    pub fn can_mutate(&self, owner_id: i64) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

pub fn now_secs() -> Result<u64, AppError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Signs a new JWT for the user, valid for `expiration_seconds`.
pub fn sign_jwt(
    id: i64,
    role: Role,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let now = now_secs()?;

    let claims = Claims {
        sub: id.to_string(),
        role,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now as usize,
        exp: (now + expiration_seconds) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string. Bad signatures and expired tokens are
/// both `AuthError`.
///
/// No clock leeway: a token is dead the second `exp` passes, which is also
/// when logout is allowed to forget its revocation row.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn is_revoked(pool: &SqlitePool, jti: &str) -> Result<bool, AppError> {
    let row = sqlx::query("SELECT 1 FROM revoked_tokens WHERE jti = ?")
        .bind(jti)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Resolves the caller from a bearer token: signature, expiry, revocation and
/// the user's continued existence are all checked.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::AuthError("Missing token".to_string()))?;

    let claims = verify_jwt(token, &state.config.jwt_secret)?;

    if is_revoked(&state.pool, &claims.jti).await? {
        return Err(AppError::AuthError("Token has been revoked".to_string()));
    }

    let user_id = claims.user_id()?;
    let (id, role) = sqlx::query_as::<_, (i64, Role)>("SELECT id, role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;

    Ok(AuthUser { id, role })
}

/// Axum Middleware: Authentication.
///
/// Rejects the request with 401 unless `authenticate` succeeds, then injects
/// the `AuthUser` into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, req.headers()).await.map_err(|e| {
        tracing::debug!("Rejected request to {}: {}", req.uri().path(), e);
        e
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "unit_test_secret";

    fn caller(id: i64, role: Role) -> AuthUser {
        AuthUser { id, role }
    }

    #[test]
    fn signed_token_verifies_with_same_secret() {
        let token = sign_jwt(42, Role::Admin, SECRET, 600).unwrap();
        let claims = verify_jwt(&token, SECRET).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let a = verify_jwt(&sign_jwt(1, Role::User, SECRET, 600).unwrap(), SECRET).unwrap();
        let b = verify_jwt(&sign_jwt(1, Role::User, SECRET, 600).unwrap(), SECRET).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_jwt(1, Role::User, SECRET, 600).unwrap();
        assert!(matches!(
            verify_jwt(&token, "other_secret"),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = now_secs().unwrap() as usize;
        let claims = Claims {
            sub: "1".to_string(),
            role: Role::User,
            jti: "expired".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(verify_jwt(&token, SECRET).is_err());
    }

    #[test]
    fn recently_expired_token_gets_no_grace_period() {
        let now = now_secs().unwrap() as usize;
        let claims = Claims {
            sub: "1".to_string(),
            role: Role::User,
            jti: "just-expired".to_string(),
            iat: now - 60,
            exp: now - 5,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_jwt(&token, SECRET),
            Err(AppError::AuthError(_))
        ));
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn owner_or_admin_may_mutate() {
        assert!(caller(7, Role::User).can_mutate(7));
        assert!(!caller(7, Role::User).can_mutate(8));
        assert!(caller(1, Role::Admin).can_mutate(8));
    }
}
