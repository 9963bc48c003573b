//! Temporal statistics engine
//!
//! Turns unsorted event snapshots into calendar-aligned series:
//! - [`timeframe`]: calendar-aligned bucket generation
//! - [`sweep`]: linear-time assignment of sorted events to buckets
//! - [`metrics`]: raw counts, first-occurrence counts, ratios
//! - [`scope`]: scope registry and dataset resolution
//! - [`request`]: request parsing and validation
//! - [`service`]: request orchestration over an [`EventStore`](crate::store::EventStore)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chatstats_core::stats::StatisticsService;
//! use chatstats_core::store::JsonFileStore;
//!
//! let store = JsonFileStore::new("inputs.json", "users.json");
//! let service = StatisticsService::new(store, chrono_tz::UTC);
//! let (status, body) = service.respond(Some(&request_body)).await;
//! ```

pub mod metrics;
pub mod request;
pub mod scope;
pub mod service;
pub mod sweep;
pub mod timeframe;

pub use metrics::{first_seen, new_entity_counts, ratio, raw_counts, FirstSeen, NewEntityPolicy};
pub use request::StatsRequest;
pub use scope::{list_scopes, resolve, Calculator, ScopeDescriptor};
pub use service::{DateWindow, StatisticsService, StatsResponse};
pub use sweep::{assign, BucketSweep};
pub use timeframe::{generate, Bucket};
