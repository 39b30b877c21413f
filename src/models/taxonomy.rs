// src/models/taxonomy.rs
//
// Categories and genres share one shape (name + unique slug) and one set of
// handlers; the marker types below select the table.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

/// A named, slugged taxonomy stored in its own table.
pub trait Taxonomy: Send + Sync + 'static {
    /// Table holding the entries.
    const TABLE: &'static str;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;
}

/// Category of a title (book, film, music...). At most one per title.
pub struct Category;

impl Taxonomy for Category {
    const TABLE: &'static str = "categories";
    const LABEL: &'static str = "Category";
}

/// Genre of a title. A title may have many.
pub struct Genre;

impl Taxonomy for Genre {
    const TABLE: &'static str = "genres";
    const LABEL: &'static str = "Genre";
}

/// Represents a row of the 'categories' or 'genres' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaxonomyEntry {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// DTO for creating a category or genre.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaxonomyRequest {
    #[validate(length(min = 1, max = 256, message = "Name must be between 1 and 256 characters."))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50, message = "Slug must be between 1 and 50 characters."),
        custom(function = validate_slug)
    )]
    pub slug: String,
}

/// Query parameters for listing categories or genres.
#[derive(Debug, Deserialize)]
pub struct TaxonomyListParams {
    /// Partial, case-insensitive match on name.
    pub search: Option<String>,
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if !SLUG_RE.is_match(slug) {
        return Err(ValidationError::new("invalid_slug").with_message(
            "Slug may contain only latin letters, digits, '-' and '_'.".into(),
        ));
    }
    Ok(())
}
