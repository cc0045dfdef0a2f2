//! fsaudit Common - Shared types and utilities
//!
//! This crate provides the identifiers, metadata records, error type and
//! configuration used across all fsaudit components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
