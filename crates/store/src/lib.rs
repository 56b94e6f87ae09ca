#![deny(unused)]
//! Storage for Vantage.
//!
//! This crate provides implementations of the interaction log:
//! - SQLite: durable, file-backed audit log
//! - InMemory: for tests and throwaway runs

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryInteractionStore;
pub use sqlite::SqliteInteractionStore;
