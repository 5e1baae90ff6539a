//! usage-state — read side of the embedded usage ledger.
//!
//! Backed by [redb](https://docs.rs/redb). The ledger holds a single
//! `"usage"` table whose keys are `user:<id>` or bucket identifiers and
//! whose values are two native-endian `u64`s: `[used_bytes, num_objects]`.
//!
//! # Architecture
//!
//! ```text
//! UsageStore (Arc<Database>)
//!   └── UsageSource::snapshot() → UsageSnapshot (read transaction)
//!         └── records() → RawRecord, in key order
//!
//! UsageRecord::decode() / encode() — fixed 16-byte value layout
//! ```
//!
//! The `UsageStore` is `Clone` + `Send` + `Sync` and can be shared with a
//! background refresh task. Dropping the last clone closes the database.

pub mod error;
pub mod record;
pub mod source;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use record::{RECORD_LEN, UsageRecord};
pub use source::{RawRecord, UsageSnapshot, UsageSource};
pub use store::UsageStore;
