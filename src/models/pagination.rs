// src/models/pagination.rs

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// `?page=N` query parameter (1-based).
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

/// Page-number envelope returned by paginated listings.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    /// Total number of items across all pages.
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A requested page, already checked against the page size.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, size: u32) -> Result<Self, AppError> {
        let number = page.unwrap_or(1);
        if number == 0 {
            return Err(invalid_page());
        }
        Ok(Self {
            number,
            size: size.max(1),
        })
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }

    /// Number of pages for `count` items. An empty listing still has one page.
    pub fn page_count(&self, count: i64) -> i64 {
        let size = i64::from(self.size);
        ((count + size - 1) / size).max(1)
    }

    /// Rejects pages past the end of a listing of `count` items.
    pub fn ensure_in_range(&self, count: i64) -> Result<(), AppError> {
        if i64::from(self.number) > self.page_count(count) {
            return Err(invalid_page());
        }
        Ok(())
    }

    /// Wraps one page of `results` with links relative to `uri`.
    pub fn into_page<T>(self, count: i64, results: Vec<T>, uri: &Uri) -> Page<T> {
        let next = (i64::from(self.number) < self.page_count(count))
            .then(|| page_link(uri, self.number + 1));
        let previous = (self.number > 1).then(|| page_link(uri, self.number - 1));
        Page {
            count,
            next,
            previous,
            results,
        }
    }
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

/// Rebuilds `uri` with its `page` parameter replaced. Page 1 drops the parameter.
fn page_link(uri: &Uri, page: u32) -> String {
    let page_pair = format!("page={}", page);
    let mut pairs: Vec<&str> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("page="))
        .collect();
    if page > 1 {
        pairs.push(&page_pair);
    }

    if pairs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}
