// src/handlers/reviews.rs

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    models::{
        pagination::{PageParams, PageRequest},
        review::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest},
    },
    policy::{AuthUser, AuthorModeratorAdminOrReadOnly, check_object},
};

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, r.author_id, r.text, \
     u.username AS author, r.score, r.pub_date \
     FROM reviews r JOIN users u ON u.id = r.author_id";

const DUPLICATE_REVIEW: &str = "You have already reviewed this title.";

/// Lists the reviews of a title, newest first. Paginated.
pub async fn list_reviews(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    OriginalUri(uri): OriginalUri,
    Path(title_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    ensure_title(&pool, title_id).await?;
    let window = PageRequest::new(params.page, config.page_size)?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = ?1")
        .bind(title_id)
        .fetch_one(&pool)
        .await?;
    window.ensure_in_range(count)?;

    let reviews = sqlx::query_as::<_, ReviewResponse>(&format!(
        "{} WHERE r.title_id = ?1 ORDER BY r.pub_date DESC, r.id DESC LIMIT ?2 OFFSET ?3",
        REVIEW_SELECT
    ))
    .bind(title_id)
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list reviews: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(window.into_page(count, reviews, &uri)))
}

/// Posts a review of a title. One review per author and title.
pub async fn create_review(
    State(pool): State<SqlitePool>,
    AuthUser(requester): AuthUser,
    Path(title_id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_title(&pool, title_id).await?;
    payload.validate()?;

    let existing: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reviews WHERE title_id = ?1 AND author_id = ?2",
    )
    .bind(title_id)
    .bind(requester.id)
    .fetch_one(&pool)
    .await?;
    if existing > 0 {
        return Err(AppError::BadRequest(DUPLICATE_REVIEW.to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO reviews (title_id, author_id, text, score, pub_date) \
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
    )
    .bind(title_id)
    .bind(requester.id)
    .bind(&payload.text)
    .bind(payload.score)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest(DUPLICATE_REVIEW.to_string())
        } else {
            tracing::error!("Failed to create review: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    tracing::info!("Review {} on title {} by {}", id, title_id, requester.username);

    let review = find_review(&pool, title_id, id).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Retrieves a review of a title.
pub async fn get_review(
    State(pool): State<SqlitePool>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    Ok(Json(review))
}

/// Edits a review. Author, moderators and admins only.
pub async fn update_review(
    State(pool): State<SqlitePool>,
    method: Method,
    AuthUser(requester): AuthUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    check_object(
        &[&AuthorModeratorAdminOrReadOnly],
        &method,
        Some(&requester),
        review.author_id,
    )?;
    payload.validate()?;

    if payload.text.is_none() && payload.score.is_none() {
        return Ok(Json(review));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE reviews SET ");
    let mut separated = builder.separated(", ");

    if let Some(text) = payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(text);
    }

    if let Some(score) = payload.score {
        separated.push("score = ");
        separated.push_bind_unseparated(score);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(review.id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update review: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let updated = find_review(&pool, title_id, review_id).await?;
    Ok(Json(updated))
}

/// Deletes a review and its comments. Author, moderators and admins only.
pub async fn delete_review(
    State(pool): State<SqlitePool>,
    method: Method,
    AuthUser(requester): AuthUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let review = find_review(&pool, title_id, review_id).await?;
    check_object(
        &[&AuthorModeratorAdminOrReadOnly],
        &method,
        Some(&requester),
        review.author_id,
    )?;

    sqlx::query("DELETE FROM reviews WHERE id = ?1")
        .bind(review.id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete review: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    tracing::info!("Review {} deleted by {}", review.id, requester.username);
    Ok(StatusCode::NO_CONTENT)
}

/// 404 unless the title exists.
pub async fn ensure_title(pool: &SqlitePool, title_id: i64) -> Result<(), AppError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE id = ?1")
        .bind(title_id)
        .fetch_optional(pool)
        .await?;
    found
        .map(|_| ())
        .ok_or(AppError::NotFound("Title not found".to_string()))
}

/// Loads a review, which must belong to `title_id`.
pub async fn find_review(
    pool: &SqlitePool,
    title_id: i64,
    review_id: i64,
) -> Result<ReviewResponse, AppError> {
    sqlx::query_as::<_, ReviewResponse>(&format!(
        "{} WHERE r.id = ?1 AND r.title_id = ?2",
        REVIEW_SELECT
    ))
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Review not found".to_string()))
}
