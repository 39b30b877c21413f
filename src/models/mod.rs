// src/models/mod.rs

pub mod comment;
pub mod pagination;
pub mod review;
pub mod taxonomy;
pub mod title;
pub mod user;
