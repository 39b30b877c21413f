// src/handlers/taxonomy.rs
//
// Handlers shared by `/categories` and `/genres`, instantiated per table:
// `list::<Category>`, `create::<Genre>`...

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::taxonomy::{CreateTaxonomyRequest, Taxonomy, TaxonomyEntry, TaxonomyListParams},
    utils::search::contains_pattern,
};

/// Lists every entry, optionally filtered by name. Not paginated.
pub async fn list<T: Taxonomy>(
    State(pool): State<SqlitePool>,
    Query(params): Query<TaxonomyListParams>,
) -> Result<impl IntoResponse, AppError> {
    let search_pattern = params.search.as_deref().map(contains_pattern);

    let entries = sqlx::query_as::<_, TaxonomyEntry>(&format!(
        "SELECT id, name, slug FROM {} WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\') ORDER BY id",
        T::TABLE
    ))
    .bind(search_pattern)
    .fetch_all(&pool)
    .await?;

    Ok(Json(entries))
}

/// Creates an entry. Slugs are unique per table.
/// Admin only.
pub async fn create<T: Taxonomy>(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTaxonomyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let entry = sqlx::query_as::<_, TaxonomyEntry>(&format!(
        "INSERT INTO {} (name, slug) VALUES (?1, ?2) RETURNING id, name, slug",
        T::TABLE
    ))
    .bind(&payload.name)
    .bind(&payload.slug)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::field(
                "slug",
                "unique",
                format!("{} with slug '{}' already exists.", T::LABEL, payload.slug),
            )
        } else {
            tracing::error!("Failed to create {}: {:?}", T::LABEL, e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Deletes an entry by slug.
/// Admin only. Titles lose the reference instead of being deleted.
pub async fn delete<T: Taxonomy>(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE slug = ?1", T::TABLE))
        .bind(&slug)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete {}: {:?}", T::LABEL, e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{} not found", T::LABEL)));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Resolves a slug of table `T` to its id, or a 400 naming `field`.
pub async fn resolve_slug<T: Taxonomy>(
    pool: &SqlitePool,
    field: &'static str,
    slug: &str,
) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(&format!("SELECT id FROM {} WHERE slug = ?1", T::TABLE))
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::field(
                field,
                "does_not_exist",
                format!("{} with slug '{}' does not exist.", T::LABEL, slug),
            )
        })
}
