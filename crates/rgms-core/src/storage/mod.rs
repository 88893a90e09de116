//! # Storage Module
//!
//! Disk-backed tracker state using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (one write transaction per commit)
//! - Crash safety (copy-on-write B-trees)
//! - Optimistic concurrency via the stored state revision

mod redb_store;

pub use redb_store::RedbStore;
