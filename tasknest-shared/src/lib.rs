//! # TaskNest Shared Library
//!
//! Types, storage and business rules shared by the TaskNest API server and
//! the retention worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their queries
//! - `store`: Storage traits, PostgreSQL and in-memory backends, list queries
//! - `auth`: Token validation, password hashing, authorization, request authentication
//! - `directory`: User lookup, credential checks, registration
//! - `service`: Task operations with timeouts and reminders
//! - `reminder`: Reminder planning and delivery seam
//! - `db`: Connection pool and migrations
//! - `clock`: Injectable time source

pub mod auth;
pub mod clock;
pub mod db;
pub mod directory;
pub mod models;
pub mod reminder;
pub mod service;
pub mod store;

/// Current version of the TaskNest shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
