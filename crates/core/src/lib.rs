#![deny(unused)]
//! Core types, traits, and error definitions for Vantage.
//!
//! This crate provides the building blocks shared by the governance filter,
//! the audit pipeline, the persistence layer and the gateway.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
