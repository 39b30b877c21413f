// src/models/title.rs

use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationErrors};

use crate::{error::field_error, models::taxonomy::TaxonomyEntry};

/// A row of the 'titles' table joined with its category and review average.
#[derive(Debug, Clone, FromRow)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    /// Average review score truncated to an integer; `None` without reviews.
    pub rating: Option<i64>,
}

/// A genre attached to a title through 'genre_title'.
#[derive(Debug, Clone, FromRow)]
pub struct TitleGenre {
    pub title_id: i64,
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Read representation of a title, with nested category and genres.
#[derive(Debug, Serialize)]
pub struct TitleResponse {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: Option<String>,
    pub category: Option<TaxonomyEntry>,
    pub genre: Vec<TaxonomyEntry>,
    pub rating: Option<i64>,
}

impl TitleResponse {
    pub fn new(row: TitleRow, genre: Vec<TaxonomyEntry>) -> Self {
        let category = match (row.category_id, row.category_name, row.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(TaxonomyEntry { id, name, slug }),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            year: row.year,
            description: row.description,
            category,
            genre,
            rating: row.rating,
        }
    }
}

/// Write representation of a title: category and genres by slug.
#[derive(Debug, Serialize)]
pub struct TitleWriteResponse {
    pub id: i64,
    pub name: String,
    pub year: i64,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Vec<String>,
}

impl From<TitleResponse> for TitleWriteResponse {
    fn from(title: TitleResponse) -> Self {
        Self {
            id: title.id,
            name: title.name,
            year: title.year,
            description: title.description,
            category: title.category.map(|c| c.slug),
            genre: title.genre.into_iter().map(|g| g.slug).collect(),
        }
    }
}

/// DTO for creating a title.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTitleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."))]
    pub name: String,

    pub year: i64,

    pub description: Option<String>,

    /// Category slug.
    pub category: Option<String>,

    /// Genre slugs.
    pub genre: Vec<String>,
}

/// DTO for partially updating a title. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTitleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."))]
    pub name: Option<String>,

    pub year: Option<i64>,

    /// Absent: unchanged. `null`: description cleared.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,

    /// Absent: unchanged. `null`: category cleared. Slug: category replaced.
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,

    /// Replaces the whole genre set when present.
    pub genre: Option<Vec<String>>,
}

/// Query parameters for listing titles.
#[derive(Debug, Deserialize)]
pub struct TitleListParams {
    /// Category slug.
    pub category: Option<String>,
    /// Genre slug.
    pub genre: Option<String>,
    /// Partial, case-insensitive match on name.
    pub name: Option<String>,
    /// Exact release year.
    pub year: Option<i64>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A title cannot be released after the current calendar year.
pub fn validate_year(year: i64) -> Result<(), ValidationErrors> {
    let current = i64::from(chrono::Utc::now().year());
    if year > current {
        return Err(field_error(
            "year",
            "max_year",
            format!("Year cannot be greater than {}.", current),
        ));
    }
    Ok(())
}
