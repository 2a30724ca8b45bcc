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
    models::{
        LikeAction, LikeResponse, StatusResponse,
        comment::{
            COMMENT_MAX_CHARS, COMMENT_VIEW_SELECT, CommentView, CreateCommentRequest,
            ReplyRequest,
        },
    },
    utils::{
        extract::ApiPath,
        html::clean_required,
        jwt::AuthUser,
        validated::ValidatedJson,
    },
};

/// What a like toggle points at. Each variant owns a counter column and a
/// `(target, user)`-unique like table.
#[derive(Debug, Clone, Copy)]
enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    fn table(self) -> &'static str {
        match self {
            LikeTarget::Post => "posts",
            LikeTarget::Comment => "comments",
        }
    }

    fn like_table(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_likes",
            LikeTarget::Comment => "comment_likes",
        }
    }

    fn key(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_id",
            LikeTarget::Comment => "comment_id",
        }
    }

    fn not_found(self) -> AppError {
        match self {
            LikeTarget::Post => AppError::NotFound("Post not found".to_string()),
            LikeTarget::Comment => AppError::NotFound("Comment not found".to_string()),
        }
    }
}

/// Check-then-write toggle inside one transaction.
///
/// Flips the like row, the target's `like_count` and the author's reputation
/// together. Self-likes do not earn reputation. The unique index on the like
/// table turns a concurrent double-like into a 409 instead of a second row.
async fn toggle_like(
    pool: &SqlitePool,
    target: LikeTarget,
    target_id: i64,
    user_id: i64,
) -> Result<LikeResponse, AppError> {
    let (table, like_table, key) = (target.table(), target.like_table(), target.key());

    let mut tx = begin_write(pool).await?;

    // 1. Target must exist
    let author_id: i64 = sqlx::query_scalar(&format!("SELECT author_id FROM {table} WHERE id = ?"))
        .bind(target_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| target.not_found())?;

    // 2. Check if already liked
    let existing = sqlx::query(&format!(
        "SELECT 1 FROM {like_table} WHERE {key} = ? AND user_id = ?"
    ))
    .bind(target_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (action, delta) = if existing.is_some() {
        sqlx::query(&format!("DELETE FROM {like_table} WHERE {key} = ? AND user_id = ?"))
            .bind(target_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        (LikeAction::Unliked, -1_i64)
    } else {
        sqlx::query(&format!("INSERT INTO {like_table} ({key}, user_id) VALUES (?, ?)"))
            .bind(target_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if crate::db::is_unique_violation(&e) {
                    // Concurrent request handled gracefully
                    return AppError::Conflict("Already liked".to_string());
                }
                AppError::from(e)
            })?;
        (LikeAction::Liked, 1_i64)
    };

    let likes: i64 = sqlx::query_scalar(&format!(
        "UPDATE {table} SET like_count = MAX(0, like_count + ?) WHERE id = ? RETURNING like_count"
    ))
    .bind(delta)
    .bind(target_id)
    .fetch_one(&mut *tx)
    .await?;

    if author_id != user_id {
        sqlx::query("UPDATE users SET reputation = MAX(0, reputation + ?) WHERE id = ?")
            .bind(delta)
            .bind(author_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(LikeResponse {
        success: true,
        action,
        likes,
    })
}

/// Toggle Like on a post.
pub async fn toggle_post_like(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = toggle_like(&pool, LikeTarget::Post, post_id, user.id).await?;
    Ok(Json(result))
}

/// Toggle Like on a comment.
pub async fn toggle_comment_like(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = toggle_like(&pool, LikeTarget::Comment, comment_id, user.id).await?;
    Ok(Json(result))
}

pub(crate) async fn fetch_comments(
    conn: &mut SqliteConnection,
    post_id: i64,
) -> Result<Vec<CommentView>, AppError> {
    let sql = format!("{COMMENT_VIEW_SELECT} WHERE c.post_id = ? ORDER BY c.created_at ASC, c.id ASC");
    let comments = sqlx::query_as::<_, CommentView>(&sql)
        .bind(post_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(comments)
}

/// Inserts a comment and bumps the post's `comment_count` in one transaction.
///
/// A `parent_id` must name a comment on the same post.
async fn insert_comment(
    pool: &SqlitePool,
    post_id: i64,
    parent_id: Option<i64>,
    author_id: i64,
    body: &str,
) -> Result<CommentView, AppError> {
    let body = clean_required(body, "Comment", COMMENT_MAX_CHARS)?;

    let mut tx = begin_write(pool).await?;

    let post = sqlx::query("SELECT 1 FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;
    if post.is_none() {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    if let Some(pid) = parent_id {
        let parent = sqlx::query("SELECT 1 FROM comments WHERE id = ? AND post_id = ?")
            .bind(pid)
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            return Err(AppError::NotFound("Parent comment not found".to_string()));
        }
    }

    let new_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO comments (post_id, author_id, parent_id, body)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(parent_id)
    .bind(&body)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    let sql = format!("{COMMENT_VIEW_SELECT} WHERE c.id = ?");
    let comment = sqlx::query_as::<_, CommentView>(&sql)
        .bind(new_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = author_id, post_id, comment_id = new_id, "Added comment");

    Ok(comment)
}

/// Create a new comment on a post, optionally as a reply.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(post_id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = insert_comment(&pool, post_id, payload.parent_id, user.id, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Reply to a comment. The post is taken from the parent.
pub async fn reply_comment(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(parent_id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<ReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post_id: i64 = sqlx::query_scalar("SELECT post_id FROM comments WHERE id = ?")
        .bind(parent_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

    let comment = insert_comment(&pool, post_id, Some(parent_id), user.id, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// List all comments for a post, oldest first. Unknown posts yield `[]`.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    ApiPath(post_id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let comments = fetch_comments(&mut conn, post_id).await?;
    Ok(Json(comments))
}

/// Delete a comment.
/// Requires: Login + (Author OR Admin). Replies cascade, so the post's
/// `comment_count` is recounted rather than decremented.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = begin_write(&pool).await?;

    let (author_id, post_id) =
        sqlx::query_as::<_, (i64, i64)>("SELECT author_id, post_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !user.can_mutate(author_id) {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE posts SET comment_count = (SELECT COUNT(*) FROM comments WHERE post_id = ?1) WHERE id = ?1",
    )
    .bind(post_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = user.id, comment_id = id, "Deleted comment");

    Ok(Json(StatusResponse::ok("Comment deleted")))
}
