//! usage-metrics — republishes the usage ledger as live counters.
//!
//! Reads tenant (`user:<id>`) and bucket usage records from the embedded
//! ledger on a fixed interval and overwrites the matching counter sets in
//! two bounded caches, which exporters read through a [`CounterRegistry`].
//!
//! # Architecture
//!
//! ```text
//! UsageMetrics (start / stop / Drop)
//!   ├── UsageStore ← opened at start, closed after the thread is joined
//!   ├── CounterRegistry ← "usage.user" / "usage.bucket" families
//!   └── usage_metrics thread
//!         └── RefreshLoop::run()
//!               ├── refresh_once() → snapshot → UsageRecord::decode()
//!               │     └── CounterRouter::route() → LruCounterCache
//!               └── sleep(interval) | shutdown
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod refresh;
pub mod registry;
pub mod router;

pub use cache::{CounterCache, LruCounterCache, UsageCounters, UsageField};
pub use config::UsageMetricsConfig;
pub use error::{MetricsError, MetricsResult};
pub use lifecycle::{CONTAINER_FAMILY, LoopState, TENANT_FAMILY, UsageMetrics};
pub use refresh::{CycleStats, RefreshLoop};
pub use registry::{CounterRegistry, CounterSample};
pub use router::{CounterRouter, Scope};
