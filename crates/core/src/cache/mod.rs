//! SQLite-backed store for versioned cache generations.
//!
//! This module provides the persistent side of the offline cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - One row per generation with an explicit lifecycle state
//! - Request-keyed response entries scoped to a generation
//! - Automatic schema migrations
//! - WAL mode for concurrent readers alongside the writer thread

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{EntrySummary, StoredEntry};
pub use generations::{Generation, GenerationEvent, GenerationState};
