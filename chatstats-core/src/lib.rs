//! # chatstats-core
//!
//! Core library for chatstats - usage analytics for a chat bot.
//!
//! This library provides:
//! - Domain types for events, scopes and series
//! - The temporal statistics engine
//! - The event store seam
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three steps per request:
//! - **Fetch:** full, unsorted event snapshots from an [`EventStore`]
//! - **Bucket:** sort, window and sweep events into calendar buckets
//! - **Derive:** counts, first occurrences, running totals and ratios
//!
//! ## Example
//!
//! ```rust,no_run
//! use chatstats_core::{Config, JsonFileStore, StatisticsService};
//!
//! # async fn run() -> chatstats_core::Result<()> {
//! let config = Config::load()?;
//! let store = JsonFileStore::from_config(&config.store);
//! let service = StatisticsService::new(store, config.stats.timezone()?);
//!
//! let body = serde_json::json!({
//!     "scopes": {"inputs": true},
//!     "timeframes": {"byMonth": true}
//! });
//! let (status, response) = service.respond(Some(&body)).await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use stats::{StatisticsService, StatsRequest, StatsResponse};
pub use store::{EventStore, JsonFileStore};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod logging;
pub mod stats;
pub mod store;
pub mod types;
