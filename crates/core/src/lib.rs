//! Core types and shared functionality for the Asha offline cache.
//!
//! This crate provides:
//! - Generation store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, EntrySummary, Generation, GenerationEvent, GenerationState, StoredEntry};
pub use config::AppConfig;
pub use error::Error;
