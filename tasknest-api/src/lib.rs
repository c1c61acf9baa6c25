//! # TaskNest API Server Library
//!
//! HTTP surface of TaskNest: bearer-authenticated, per-user task management.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors that reject with the API error body
//! - `middleware`: Security headers, rate limiting, authentication, owner guard
//! - `routes`: API route handlers
//! - `telemetry`: Tracing subscriber setup

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod telemetry;
