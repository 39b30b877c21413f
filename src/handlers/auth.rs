// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;
use validator::{Validate, ValidationErrors};

use crate::{
    config::Config,
    error::{AppError, add_field_error, is_unique_violation},
    models::user::{SignupRequest, TokenRequest, USER_COLUMNS, User},
    utils::{
        code::{generate_code, hash_code, verify_code},
        jwt::sign_jwt,
        mail::{Mailer, confirmation_message},
    },
};

/// Registers a user, or re-issues a code to an existing one.
///
/// The `(username, email)` pair either names an existing user or must be
/// entirely free. A fresh confirmation code is mailed in plaintext; only its
/// digest is stored. New users stay inactive until the code is redeemed.
pub async fn signup(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    State(mailer): State<Arc<dyn Mailer>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = get_or_create_pending(&pool, &payload.username, &payload.email).await?;

    let code = generate_code();
    let code_hash = hash_code(&code)?;

    mailer
        .send(confirmation_message(&config.mail_from, &user.email, &code))
        .await?;

    sqlx::query("UPDATE users SET confirmation_code = ?1 WHERE id = ?2")
        .bind(&code_hash)
        .bind(user.id)
        .execute(&pool)
        .await?;

    tracing::info!("Confirmation code issued to {}", user.username);

    Ok(Json(payload))
}

/// Finds the user owning exactly this pair, or creates an inactive one.
async fn get_or_create_pending(
    pool: &SqlitePool,
    username: &str,
    email: &str,
) -> Result<User, AppError> {
    let existing = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1 AND email = ?2",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(email)
    .fetch_optional(pool)
    .await?;

    if let Some(user) = existing {
        return Ok(user);
    }

    ensure_unique(pool, Some(username), Some(email), None).await?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, is_active, date_joined) \
         VALUES (?1, ?2, FALSE, ?3) RETURNING {}",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(email)
    .bind(chrono::Utc::now())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest("A user with that email or username already exists.".to_string())
        } else {
            tracing::error!("Failed to create user on signup: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!("New pending user {}", user.username);
    Ok(user)
}

/// Exchanges a confirmation code for an access token.
///
/// The code is single-use: it is cleared and the user activated on success.
pub async fn obtain_token(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<TokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?1",
        USER_COLUMNS
    ))
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !verify_code(&payload.confirmation_code, &user.confirmation_code)? {
        return Err(AppError::field(
            "confirmation_code",
            "invalid",
            "Invalid confirmation code.",
        ));
    }

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    sqlx::query("UPDATE users SET is_active = TRUE, confirmation_code = '' WHERE id = ?1")
        .bind(user.id)
        .execute(&pool)
        .await?;

    tracing::info!("User {} activated", user.username);

    Ok(Json(json!({ "token": token })))
}

/// Rejects a username or email already bound to a user other than `except`,
/// naming every conflicting field.
pub async fn ensure_unique(
    pool: &SqlitePool,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i64>,
) -> Result<(), AppError> {
    let mut conflicts = ValidationErrors::new();

    if let Some(username) = username {
        if taken(pool, "username", username, except).await? {
            add_field_error(
                &mut conflicts,
                "username",
                "unique",
                "A user with that username already exists.",
            );
        }
    }

    if let Some(email) = email {
        if taken(pool, "email", email, except).await? {
            add_field_error(
                &mut conflicts,
                "email",
                "unique",
                "A user with that email already exists.",
            );
        }
    }

    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(conflicts))
    }
}

/// True when `column` holds `value` for a user other than `except`.
async fn taken(
    pool: &SqlitePool,
    column: &'static str,
    value: &str,
    except: Option<i64>,
) -> Result<bool, AppError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM users WHERE {} = ?1 AND (?2 IS NULL OR id <> ?2)",
        column
    ))
    .bind(value)
    .bind(except)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}
