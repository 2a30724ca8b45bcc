use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    db::is_unique_violation,
    error::AppError,
    models::user::{BIO_MAX_CHARS, USER_COLUMNS, UpdateProfileRequest, User, UserResponse},
    utils::{html::clean_bounded, jwt::AuthUser, validated::ValidatedJson},
};

pub(crate) async fn fetch_user(pool: &SqlitePool, id: i64) -> Result<User, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Get the caller's public profile.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let me = fetch_user(&pool, user.id).await?;
    Ok(Json(UserResponse::from(me)))
}

/// Update the caller's username, email, bio or avatar. Absent fields are kept.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");
    let mut changed = false;

    if let Some(username) = payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
        changed = true;
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email.to_lowercase());
        changed = true;
    }

    if let Some(bio) = payload.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(clean_bounded(&bio, "Bio", BIO_MAX_CHARS)?);
        changed = true;
    }

    if let Some(avatar_url) = payload.avatar_url {
        // An empty string clears the avatar.
        separated.push("avatar_url = ");
        separated.push_bind_unseparated((!avatar_url.is_empty()).then_some(avatar_url));
        changed = true;
    }

    if changed {
        builder.push(" WHERE id = ");
        builder.push_bind(user.id);

        builder.build().execute(&pool).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username or email already exists".to_string())
            } else {
                tracing::error!("Failed to update profile: {:?}", e);
                AppError::from(e)
            }
        })?;

        tracing::info!(user_id = user.id, "Profile updated");
    }

    let me = fetch_user(&pool, user.id).await?;
    Ok(Json(UserResponse::from(me)))
}
