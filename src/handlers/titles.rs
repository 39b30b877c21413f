// src/handlers/titles.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::taxonomy::resolve_slug,
    models::{
        taxonomy::{Category, Genre, TaxonomyEntry},
        title::{
            CreateTitleRequest, TitleGenre, TitleListParams, TitleResponse, TitleRow,
            TitleWriteResponse, UpdateTitleRequest, validate_year,
        },
    },
    utils::search::contains_pattern,
};

/// Title columns with the nested category and the truncated review average.
const TITLE_SELECT: &str = r#"
    SELECT
        t.id, t.name, t.year, t.description,
        c.id AS category_id, c.name AS category_name, c.slug AS category_slug,
        (SELECT CAST(AVG(r.score) AS INTEGER) FROM reviews r WHERE r.title_id = t.id) AS rating
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE 1 = 1
"#;

/// Lists titles, filtered by category slug, genre slug, name fragment and year.
pub async fn list_titles(
    State(pool): State<SqlitePool>,
    Query(params): Query<TitleListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(TITLE_SELECT);

    if let Some(category) = params.category {
        builder.push(" AND c.slug = ");
        builder.push_bind(category);
    }

    if let Some(genre) = params.genre {
        builder.push(
            " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
             WHERE gt.title_id = t.id AND g.slug = ",
        );
        builder.push_bind(genre);
        builder.push(")");
    }

    if let Some(name) = params.name {
        builder.push(" AND t.name LIKE ");
        builder.push_bind(contains_pattern(&name));
        builder.push(" ESCAPE '\\'");
    }

    if let Some(year) = params.year {
        builder.push(" AND t.year = ");
        builder.push_bind(year);
    }

    builder.push(" ORDER BY t.id");

    let rows = builder
        .build_query_as::<TitleRow>()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list titles: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let mut conn = pool.acquire().await?;
    let titles = with_genres(&mut conn, rows).await?;

    Ok(Json(titles))
}

/// Retrieves a single title by ID.
pub async fn get_title(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;
    let title = fetch_title(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Title not found".to_string()))?;

    Ok(Json(title))
}

/// Creates a title with its category and genres given by slug.
/// Admin only.
pub async fn create_title(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTitleRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    validate_year(payload.year)?;

    let category_id = match &payload.category {
        Some(slug) => Some(resolve_slug::<Category>(&pool, "category", slug).await?),
        None => None,
    };
    let genre_ids = resolve_genres(&pool, &payload.genre).await?;

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO titles (name, year, description, category_id) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(&payload.name)
    .bind(payload.year)
    .bind(&payload.description)
    .bind(category_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create title: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    link_genres(&mut tx, id, &genre_ids).await?;

    let title = fetch_title(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("Created title vanished".to_string()))?;

    tx.commit().await?;

    tracing::info!("Title {} created", id);

    Ok((StatusCode::CREATED, Json(TitleWriteResponse::from(title))))
}

/// Updates a title by ID. Fields are optional; `genre` replaces the whole set.
/// Admin only.
pub async fn update_title(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTitleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE id = ?1")
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Title not found".to_string()));
    }

    payload.validate()?;
    if let Some(year) = payload.year {
        validate_year(year)?;
    }

    let category_id = match &payload.category {
        Some(Some(slug)) => Some(Some(resolve_slug::<Category>(&pool, "category", slug).await?)),
        Some(None) => Some(None),
        None => None,
    };
    let genre_ids = match &payload.genre {
        Some(slugs) => Some(resolve_genres(&pool, slugs).await?),
        None => None,
    };

    let mut tx = pool.begin().await?;

    if payload.name.is_some()
        || payload.year.is_some()
        || payload.description.is_some()
        || category_id.is_some()
    {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE titles SET ");
        let mut separated = builder.separated(", ");

        if let Some(name) = payload.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name);
        }

        if let Some(year) = payload.year {
            separated.push("year = ");
            separated.push_bind_unseparated(year);
        }

        if let Some(description) = payload.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description);
        }

        if let Some(category_id) = category_id {
            separated.push("category_id = ");
            separated.push_bind_unseparated(category_id);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        builder.build().execute(&mut *tx).await.map_err(|e| {
            tracing::error!("Failed to update title: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    if let Some(genre_ids) = genre_ids {
        sqlx::query("DELETE FROM genre_title WHERE title_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_genres(&mut tx, id, &genre_ids).await?;
    }

    let title = fetch_title(&mut tx, id)
        .await?
        .ok_or(AppError::NotFound("Title not found".to_string()))?;

    tx.commit().await?;

    Ok(Json(TitleWriteResponse::from(title)))
}

/// Deletes a title by ID, with its reviews and their comments.
/// Admin only.
pub async fn delete_title(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM titles WHERE id = ?1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete title: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Title not found".to_string()));
    }

    tracing::info!("Title {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Resolves genre slugs to ids, dropping duplicates but keeping order.
async fn resolve_genres(pool: &SqlitePool, slugs: &[String]) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let id = resolve_slug::<Genre>(pool, "genre", slug).await?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

async fn link_genres(
    conn: &mut SqliteConnection,
    title_id: i64,
    genre_ids: &[i64],
) -> Result<(), AppError> {
    for genre_id in genre_ids {
        sqlx::query("INSERT INTO genre_title (title_id, genre_id) VALUES (?1, ?2)")
            .bind(title_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Loads one title with its genres.
pub async fn fetch_title(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<TitleResponse>, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(TITLE_SELECT);
    builder.push(" AND t.id = ");
    builder.push_bind(id);

    let row = builder
        .build_query_as::<TitleRow>()
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(with_genres(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Title ids bound per genre lookup, well under SQLite's parameter limit.
const GENRE_BATCH: usize = 500;

/// Attaches genres to each row, keeping row order.
async fn with_genres(
    conn: &mut SqliteConnection,
    rows: Vec<TitleRow>,
) -> Result<Vec<TitleResponse>, AppError> {
    let mut by_title: HashMap<i64, Vec<TaxonomyEntry>> = HashMap::new();

    for batch in rows.chunks(GENRE_BATCH) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT gt.title_id, g.id, g.name, g.slug \
             FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
             WHERE gt.title_id IN (",
        );
        let mut separated = builder.separated(", ");
        for row in batch {
            separated.push_bind(row.id);
        }
        separated.push_unseparated(") ORDER BY g.id");

        let links = builder
            .build_query_as::<TitleGenre>()
            .fetch_all(&mut *conn)
            .await?;

        for link in links {
            by_title.entry(link.title_id).or_default().push(TaxonomyEntry {
                id: link.id,
                name: link.name,
                slug: link.slug,
            });
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let genre = by_title.remove(&row.id).unwrap_or_default();
            TitleResponse::new(row, genre)
        })
        .collect())
}
