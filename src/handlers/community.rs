use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::{begin_write, is_unique_violation},
    error::AppError,
    models::{
        StatusResponse,
        community::{
            COMMUNITY_COLUMNS, Community, CreateCommunityRequest, DESCRIPTION_MAX_CHARS,
            NAME_MAX_CHARS,
        },
    },
    utils::{
        extract::ApiPath,
        html::{clean_bounded, clean_required},
        jwt::AuthUser,
        validated::ValidatedJson,
    },
};

async fn fetch_community(conn: &mut SqliteConnection, id: i64) -> Result<Community, AppError> {
    let sql = format!("SELECT {COMMUNITY_COLUMNS} FROM communities WHERE id = ?");
    sqlx::query_as::<_, Community>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Community not found".to_string()))
}

/// List communities, largest first.
/// Ties are broken by recency.
pub async fn list_communities(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "SELECT {COMMUNITY_COLUMNS} FROM communities ORDER BY member_count DESC, created_at DESC, id DESC"
    );
    let communities = sqlx::query_as::<_, Community>(&sql)
        .fetch_all(&pool)
        .await?;

    Ok(Json(communities))
}

pub async fn get_community(
    State(pool): State<SqlitePool>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let community = fetch_community(&mut conn, id).await?;
    Ok(Json(community))
}

/// Create a community. The creator becomes its first member.
pub async fn create_community(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<CreateCommunityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let name = clean_required(&payload.name, "Community name", NAME_MAX_CHARS)?;
    let description = payload
        .description
        .as_deref()
        .map(|d| clean_bounded(d, "Description", DESCRIPTION_MAX_CHARS))
        .transpose()?
        .unwrap_or_default();

    let mut tx = begin_write(&pool).await?;

    let community_id: i64 = sqlx::query_scalar(
        "INSERT INTO communities (name, description, created_by) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(&name)
    .bind(&description)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Community name already exists".to_string())
        } else {
            tracing::error!("Failed to create community: {:?}", e);
            AppError::from(e)
        }
    })?;

    sqlx::query("INSERT INTO community_members (community_id, user_id) VALUES (?, ?)")
        .bind(community_id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE communities SET member_count = 1 WHERE id = ?")
        .bind(community_id)
        .execute(&mut *tx)
        .await?;

    let community = fetch_community(&mut tx, community_id).await?;

    tx.commit().await?;

    tracing::info!(user_id = user.id, community_id, "Created community {}", community.name);

    Ok((StatusCode::CREATED, Json(community)))
}

/// Join a community. A second join by the same user is a 409 and changes nothing.
pub async fn join_community(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_write(&pool).await?;

    fetch_community(&mut tx, id).await?;

    let existing = sqlx::query("SELECT 1 FROM community_members WHERE community_id = ? AND user_id = ?")
        .bind(id)
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Already a member".to_string()));
    }

    sqlx::query("INSERT INTO community_members (community_id, user_id) VALUES (?, ?)")
        .bind(id)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Already a member".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    let member_count: i64 = sqlx::query_scalar(
        "UPDATE communities SET member_count = member_count + 1 WHERE id = ? RETURNING member_count",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(StatusResponse {
        member_count: Some(member_count),
        ..StatusResponse::ok("Joined community")
    }))
}

/// Leave a community. Callers that are not members get a 404.
pub async fn leave_community(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_write(&pool).await?;

    fetch_community(&mut tx, id).await?;

    let removed = sqlx::query("DELETE FROM community_members WHERE community_id = ? AND user_id = ?")
        .bind(id)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    if removed.rows_affected() == 0 {
        return Err(AppError::NotFound("Not a member of this community".to_string()));
    }

    let member_count: i64 = sqlx::query_scalar(
        "UPDATE communities SET member_count = MAX(0, member_count - 1) WHERE id = ? RETURNING member_count",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(StatusResponse {
        member_count: Some(member_count),
        ..StatusResponse::ok("Left community")
    }))
}
