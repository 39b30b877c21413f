use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'comments' table joined with the author's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentResponse {
    pub id: i64,

    #[serde(skip)]
    pub author_id: i64,

    /// Username of the author.
    pub author: String,

    /// The review this comment replies to.
    pub review: i64,

    pub text: String,

    pub pub_date: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, message = "Comment text may not be blank."))]
    pub text: String,
}

/// DTO for partially updating a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, message = "Comment text may not be blank."))]
    pub text: Option<String>,
}
