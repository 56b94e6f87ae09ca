//! Core traits for Vantage.
//!
//! - `store`: persistence contract for interaction records
//! - `safety`: external safety classification

pub mod safety;
pub mod store;

pub use safety::*;
pub use store::*;
