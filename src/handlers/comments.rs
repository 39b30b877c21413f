// src/handlers/comments.rs

use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::reviews::find_review,
    models::comment::{CommentRequest, CommentResponse, UpdateCommentRequest},
    policy::{AuthUser, AuthorModeratorAdminOrReadOnly, check_object},
};

const COMMENT_SELECT: &str = "SELECT c.id, c.author_id, u.username AS author, \
     c.review_id AS review, c.text, c.pub_date \
     FROM comments c JOIN users u ON u.id = c.author_id";

/// Lists the comments on a review, newest first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(&format!(
        "{} WHERE c.review_id = ?1 ORDER BY c.pub_date DESC, c.id DESC",
        COMMENT_SELECT
    ))
    .bind(review.id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list comments: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(comments))
}

/// Posts a comment on a review.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    AuthUser(requester): AuthUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    payload.validate()?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO comments (review_id, author_id, text, pub_date) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(review.id)
    .bind(requester.id)
    .bind(&payload.text)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let comment = find_comment(&pool, review.id, id).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Retrieves a comment.
pub async fn get_comment(
    State(pool): State<SqlitePool>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    let comment = find_comment(&pool, review.id, comment_id).await?;
    Ok(Json(comment))
}

/// Edits a comment. Author, moderators and admins only.
pub async fn update_comment(
    State(pool): State<SqlitePool>,
    method: Method,
    AuthUser(requester): AuthUser,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    let comment = find_comment(&pool, review.id, comment_id).await?;
    check_object(
        &[&AuthorModeratorAdminOrReadOnly],
        &method,
        Some(&requester),
        comment.author_id,
    )?;
    payload.validate()?;

    let Some(text) = payload.text else {
        return Ok(Json(comment));
    };

    sqlx::query("UPDATE comments SET text = ?1 WHERE id = ?2")
        .bind(&text)
        .bind(comment.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update comment: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let updated = find_comment(&pool, review.id, comment.id).await?;
    Ok(Json(updated))
}

/// Deletes a comment. Author, moderators and admins only.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    method: Method,
    AuthUser(requester): AuthUser,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    let comment = find_comment(&pool, review.id, comment_id).await?;
    check_object(
        &[&AuthorModeratorAdminOrReadOnly],
        &method,
        Some(&requester),
        comment.author_id,
    )?;

    sqlx::query("DELETE FROM comments WHERE id = ?1")
        .bind(comment.id)
        .execute(&pool)
        .await?;

    tracing::info!("Comment {} deleted by {}", comment.id, requester.username);
    Ok(StatusCode::NO_CONTENT)
}

async fn find_comment(
    pool: &SqlitePool,
    review_id: i64,
    comment_id: i64,
) -> Result<CommentResponse, AppError> {
    sqlx::query_as::<_, CommentResponse>(&format!(
        "{} WHERE c.id = ?1 AND c.review_id = ?2",
        COMMENT_SELECT
    ))
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))
}
