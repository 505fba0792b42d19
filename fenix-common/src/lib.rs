//! # Fênix Common Library
//!
//! Shared code for the Fênix admin service and operator CLI:
//! - Configuration resolution (CLI / env / TOML / defaults)
//! - Database initialization and row models
//! - Password hashing and session tokens
//! - Object storage for cover and page images

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod storage;

pub use error::{Error, Result};
pub use storage::MediaStore;
