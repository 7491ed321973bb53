//! Core types and utilities for the token launch feed
//!
//! This crate provides shared types used across all components:
//! - Token records and enrichment metrics
//! - Market-cap classifier
//! - Numeric coercion and display formatting
//! - Configuration and error types

pub mod types;
pub mod tokens;
pub mod classifier;
pub mod format;
pub mod config;
pub mod errors;

pub use types::*;
pub use tokens::*;
pub use classifier::*;
pub use self::config::*;
pub use errors::*;
