//! # ARF Common Library
//!
//! Shared code for the asset relationship finder:
//! - Marketing asset models returned by the data-source adapters
//! - Configuration loading and resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
