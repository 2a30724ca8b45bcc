use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{comment::CommentView, trimmed, user::Role};

/// A row of the 'posts' table joined with its author and community.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub body: String,

    pub author_id: i64,
    pub author_username: String,
    pub author_role: Role,

    /// Posts may live outside any community.
    pub community_id: Option<i64>,
    pub community_name: Option<String>,

    pub like_count: i64,
    pub comment_count: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// SELECT list and joins producing a [`PostView`]; callers append WHERE/ORDER BY.
pub const POST_VIEW_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.body,
        p.author_id, u.username AS author_username, u.role AS author_role,
        p.community_id, c.name AS community_name,
        p.like_count, p.comment_count, p.created_at
    FROM posts p
    JOIN users u ON p.author_id = u.id
    LEFT JOIN communities c ON p.community_id = c.id
"#;

/// Limits on the stored (sanitized) title and body.
pub const TITLE_MAX_CHARS: usize = 200;
pub const BODY_MAX_CHARS: usize = 10_000;

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[serde(deserialize_with = "trimmed")]
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Body length must be between 1 and 10000 chars"
    ))]
    pub body: String,

    #[serde(default)]
    pub community_id: Option<i64>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// Restrict the listing to one community.
    pub community_id: Option<i64>,

    /// Number of items to return (default: 50, max: 100).
    pub limit: Option<i64>,
}

/// `GET /api/posts/{id}`: the post together with its comment thread.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: PostView,
    pub comments: Vec<CommentView>,
}
