//! redb table definitions for the usage ledger.
//!
//! Keys are raw bytes (UTF-8 in practice) so that whatever the writer
//! stored can be iterated; values are the fixed layout in [`crate::record`].

use redb::TableDefinition;

/// Usage records keyed by `user:<id>` or a bucket identifier.
pub const USAGE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("usage");
