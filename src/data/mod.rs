//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations
//! - Repository traits separating storage from the entities
//! - Object cache (volatile, session scoped)

mod cache;
mod database;
mod models;
mod repository;

pub use cache::ObjectCache;
pub use database::Database;
pub use models::*;
pub use repository::{FileDataRepository, LearningModuleRepository, ObjectQuery, ObjectRepository};
