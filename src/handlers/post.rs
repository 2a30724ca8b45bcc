use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    db::begin_write,
    error::AppError,
    handlers::interaction::fetch_comments,
    models::{
        StatusResponse,
        post::{
            BODY_MAX_CHARS, CreatePostRequest, POST_VIEW_SELECT, PostDetail, PostListParams,
            PostView, TITLE_MAX_CHARS,
        },
    },
    utils::{
        extract::{ApiPath, ApiQuery},
        html::clean_required,
        jwt::AuthUser,
        validated::ValidatedJson,
    },
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 100;

pub(crate) async fn fetch_post(conn: &mut SqliteConnection, id: i64) -> Result<PostView, AppError> {
    let sql = format!("{POST_VIEW_SELECT} WHERE p.id = ?");
    sqlx::query_as::<_, PostView>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Create a new post, optionally inside a community.
/// The author's `post_count` moves in the same transaction.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(payload): ValidatedJson<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let title = clean_required(&payload.title, "Title", TITLE_MAX_CHARS)?;
    let body = clean_required(&payload.body, "Body", BODY_MAX_CHARS)?;

    let mut tx = begin_write(&pool).await?;

    if let Some(community_id) = payload.community_id {
        let exists = sqlx::query("SELECT 1 FROM communities WHERE id = ?")
            .bind(community_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Community not found".to_string()));
        }
    }

    let post_id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (title, body, author_id, community_id) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&title)
    .bind(&body)
    .bind(user.id)
    .bind(payload.community_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    sqlx::query("UPDATE users SET post_count = post_count + 1 WHERE id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    let post = fetch_post(&mut tx, post_id).await?;

    tx.commit().await?;

    tracing::info!(user_id = user.id, post_id, "Created post");

    Ok((StatusCode::CREATED, Json(post)))
}

/// List posts (Recent first), optionally restricted to one community.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    ApiQuery(params): ApiQuery<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let sql = format!(
        "{POST_VIEW_SELECT}
        WHERE (?1 IS NULL OR p.community_id = ?1)
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT ?2"
    );
    let posts = sqlx::query_as::<_, PostView>(&sql)
        .bind(params.community_id)
        .bind(limit)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list posts: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(posts))
}

/// Get a single post with its comments (oldest first).
pub async fn get_post(
    State(pool): State<SqlitePool>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let post = fetch_post(&mut conn, id).await?;
    let comments = fetch_comments(&mut conn, id).await?;

    Ok(Json(PostDetail { post, comments }))
}

/// Delete a post.
/// Requires: Login + (Author OR Admin). Comments and likes cascade.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_write(&pool).await?;

    // 1. Fetch Post to check ownership
    let author_id: i64 = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    // 2. Check Permission
    if !user.can_mutate(author_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    // 3. Delete and settle the author's counter
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::from(e)
        })?;

    sqlx::query("UPDATE users SET post_count = MAX(0, post_count - 1) WHERE id = ?")
        .bind(author_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = user.id, post_id = id, "Deleted post");

    Ok(Json(StatusResponse::ok("Post deleted")))
}
