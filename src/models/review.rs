// src/models/review.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'reviews' table joined with the author's username.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewResponse {
    pub id: i64,

    #[serde(skip)]
    pub title_id: i64,

    #[serde(skip)]
    pub author_id: i64,

    pub text: String,

    /// Username of the author.
    pub author: String,

    /// Score between 1 and 10 inclusive.
    pub score: i64,

    pub pub_date: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a review.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1, message = "Review text may not be blank."))]
    pub text: String,

    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: i64,
}

/// DTO for partially updating a review. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1, message = "Review text may not be blank."))]
    pub text: Option<String>,

    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: Option<i64>,
}
