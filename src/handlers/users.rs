// src/handlers/users.rs

use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    handlers::auth::ensure_unique,
    models::{
        pagination::PageRequest,
        user::{
            CreateUserRequest, USER_COLUMNS, UpdateUserRequest, User, UserListParams, UserResponse,
        },
    },
    policy::AuthUser,
    utils::search::contains_pattern,
};

/// Lists users, optionally filtered by username.
/// Admin only. Paginated.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let window = PageRequest::new(params.page, config.page_size)?;
    let search_pattern = params.search.as_deref().map(contains_pattern);

    let count: i64 =
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE (?1 IS NULL OR username LIKE ?1 ESCAPE '\\')",
        )
            .bind(&search_pattern)
            .fetch_one(&pool)
            .await?;
    window.ensure_in_range(count)?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users \
         WHERE (?1 IS NULL OR username LIKE ?1 ESCAPE '\\') \
         ORDER BY id \
         LIMIT ?2 OFFSET ?3",
        USER_COLUMNS
    ))
    .bind(&search_pattern)
    .bind(window.limit())
    .bind(window.offset())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let results = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(window.into_page(count, results, &uri)))
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_unique(&pool, Some(&payload.username), Some(&payload.email), None).await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, first_name, last_name, bio, role, date_joined) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         RETURNING {}",
        USER_COLUMNS
    ))
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.bio)
    .bind(payload.role)
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest("A user with that email or username already exists.".to_string())
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    tracing::info!("User {} created with role {}", user.username, user.role);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Retrieves a user by username.
/// Admin only.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = find_by_username(&pool, &username).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Updates user information, role included.
/// Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = find_by_username(&pool, &username).await?;
    let updated = apply_update(&pool, user, payload).await?;
    Ok(Json(UserResponse::from(updated)))
}

/// Deletes a user by username. Their reviews and comments go with them.
/// Admin only.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE username = ?1")
        .bind(&username)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("User {} deleted", username);
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the requester's own account.
pub async fn get_me(
    State(pool): State<SqlitePool>,
    AuthUser(me): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = find_by_username(&pool, &me.username).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Edits the requester's own account.
///
/// `role` in the payload is discarded: the stored role always survives.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    AuthUser(me): AuthUser,
    Json(mut payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user = find_by_username(&pool, &me.username).await?;

    if let Some(requested) = payload.role.take() {
        if requested != user.role {
            tracing::warn!(
                "Ignoring self-service role change of {} to {}",
                user.username,
                requested
            );
        }
    }

    let updated = apply_update(&pool, user, payload).await?;
    Ok(Json(UserResponse::from(updated)))
}

async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Writes the present fields of `payload` to `user` and returns the stored row.
async fn apply_update(
    pool: &SqlitePool,
    user: User,
    payload: UpdateUserRequest,
) -> Result<User, AppError> {
    if payload.is_empty() {
        return Ok(user);
    }

    ensure_unique(
        pool,
        payload.username.as_deref(),
        payload.email.as_deref(),
        Some(user.id),
    )
    .await?;

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(username) = payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
    }

    if let Some(email) = payload.email {
        separated.push("email = ");
        separated.push_bind_unseparated(email);
    }

    if let Some(first_name) = payload.first_name {
        separated.push("first_name = ");
        separated.push_bind_unseparated(first_name);
    }

    if let Some(last_name) = payload.last_name {
        separated.push("last_name = ");
        separated.push_bind_unseparated(last_name);
    }

    if let Some(bio) = payload.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(bio);
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(user.id);
    builder.push(format!(" RETURNING {}", USER_COLUMNS));

    let updated = builder
        .build_query_as::<User>()
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::BadRequest(
                    "A user with that email or username already exists.".to_string(),
                )
            } else {
                tracing::error!("Failed to update user: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    Ok(updated)
}
