use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::{trimmed, trimmed_opt};

/// Represents the 'communities' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Creator. `None` once the creating account is gone.
    pub created_by: Option<i64>,
    /// Always equal to the number of `community_members` rows for this id.
    pub member_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub const COMMUNITY_COLUMNS: &str = "id, name, description, created_by, member_count, created_at";

pub const NAME_MAX_CHARS: usize = 64;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// DTO for creating a new community.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommunityRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(
        min = 1,
        max = 64,
        message = "Community name must be between 1 and 64 characters"
    ))]
    pub name: String,

    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}
