//! # Record Storage
//!
//! redb-backed document store used by every service.
//!
//! Records are grouped into collections (one redb table per collection,
//! `u64` id → postcard bytes). Named unique indexes (`string key → id`)
//! back the "at most one X per Y" invariants of the workflow: a second
//! writer that tries to claim an index key already taken inside its own
//! write transaction sees the first writer's claim, because redb runs
//! write transactions one at a time.

mod redb_store;

pub use redb_store::{ReadScope, Record, RecordReader, RecordStore, WriteScope};
