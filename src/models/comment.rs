use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::trimmed;

/// DTO for displaying a comment with author info.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    /// The comment this one replies to, if any.
    pub parent_id: Option<i64>,
    pub body: String,
    pub like_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub const COMMENT_VIEW_SELECT: &str = r#"
    SELECT
        c.id, c.post_id, c.author_id, u.username AS author_username,
        c.parent_id, c.body, c.like_count, c.created_at
    FROM comments c
    JOIN users u ON c.author_id = u.id
"#;

pub const COMMENT_MAX_CHARS: usize = 2000;

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub body: String,

    /// Optional: the ID of the comment being replied to.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// DTO for `POST /api/comments/{id}/replies`; the post comes from the parent.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub body: String,
}
