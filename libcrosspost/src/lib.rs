//! Crosspost - cross-platform social publishing engine
//!
//! This library schedules and publishes a single logical post to multiple
//! social-media destinations, handling per-platform content rules, thread
//! auto-splitting, delayed idempotent publish jobs, and per-destination
//! execution with isolated failure.

pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod logging;
pub mod prepare;
pub mod publish;
pub mod queue;
pub mod rules;
pub mod schedule;
pub mod service;
pub mod status;
pub mod types;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CrosspostError, Result};
pub use queue::{JobQueue, RetryPolicy};
pub use types::{
    DestinationStatus, Job, Platform, Post, PostDestination, PostStatus, Profile, ThreadChunk,
};
