//! Core type definitions for Vantage.
//!
//! Broken down into submodules:
//! - `interaction`: the transient audit event and its persisted form
//! - `policy`: the governance policy loaded at startup

pub mod interaction;
pub mod policy;

pub use interaction::*;
pub use policy::*;
