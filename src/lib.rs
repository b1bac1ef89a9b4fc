//! QManager - Content management backend
//!
//! REST API for documents, courses, news articles and tests, with
//! per-type categories, file storage and bearer-token authentication.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
