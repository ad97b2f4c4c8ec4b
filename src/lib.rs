//! Blog API
//!
//! Content-management backend for a blog: posts, categories, subscribers,
//! pages and uploaded images over HTTP, backed by MongoDB and Cloudinary.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
