//! Read seams over the usage ledger.
//!
//! The refresh loop only needs "take a snapshot, walk it in key order".
//! Keeping that behind two small traits lets tests drive the loop with a
//! failing or hand-built source without touching redb.

use crate::error::StateResult;

/// One raw table entry, copied out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// A read-only, isolated view of the ledger at a point in time.
pub trait UsageSnapshot {
    /// Forward cursor over all records in key order.
    fn records(&self) -> StateResult<Box<dyn Iterator<Item = StateResult<RawRecord>> + '_>>;
}

/// Anything that can hand out ledger snapshots.
pub trait UsageSource: Send + Sync {
    /// Begin a new read snapshot. Dropping it releases the snapshot.
    fn snapshot(&self) -> StateResult<Box<dyn UsageSnapshot + '_>>;
}
