//! # Percept Common Library
//!
//! Shared code for the perception client crates including:
//! - Domain models (professions, ratings, comments, derived stats)
//! - Change events and the EventBus used for realtime delivery
//! - The `Backend` trait and its SQLite implementation
//! - Configuration loading
//! - Human-readable relative time

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod human_time;

pub use backend::Backend;
pub use error::{Error, Result};
