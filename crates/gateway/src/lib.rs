#![deny(unused)]
//! HTTP gateway for Vantage.
//!
//! This crate provides the HTTP entry point: status and listing endpoints,
//! and the governed `/v1/*` proxy group that screens, forwards and audits
//! every request.

pub mod pipeline;
pub mod proxy;
pub mod server;

pub use proxy::{HttpUpstream, Upstream, UpstreamFailure};
pub use server::{AppState, GatewayConfig, GatewayServer};
