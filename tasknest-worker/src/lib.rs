//! # TaskNest Worker Library
//!
//! Background maintenance that runs outside request handling.
//!
//! ## Modules
//!
//! - `config`: Worker configuration from the environment
//! - `retention`: Periodic purge of soft-deleted tasks past the retention window
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasknest_shared::{clock::system_clock, service::TaskService, store::MemoryTaskStore};
//! use tasknest_worker::{config::RetentionConfig, retention::RetentionSweeper};
//!
//! # async fn example() {
//! let tasks = TaskService::new(Arc::new(MemoryTaskStore::new()), system_clock());
//! let sweeper = RetentionSweeper::new(tasks, RetentionConfig::default());
//! let total = sweeper.run().await;
//! # }
//! ```

pub mod config;
pub mod retention;
