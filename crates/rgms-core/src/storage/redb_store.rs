//! # redb Store
//!
//! One table per entity kind, keyed by numeric id, with postcard-encoded
//! rows. A `meta` table holds the id counters, the opening department
//! budget and the state revision.
//!
//! Loads run in read transactions and never wait for a writer. Commits are
//! optimistic: [`RedbStore::commit`] takes the revision the caller loaded
//! at and fails with `Conflict` if another writer has moved the stored
//! revision since. The check runs inside the write transaction, and nothing
//! is written when it fails.

use crate::error::{Result, RgmsError};
use crate::tracker::{Counters, Tracker, TrackerSnapshot};
use crate::Amount;
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, TableError,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// =============================================================================
// TABLES
// =============================================================================

const ACTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("actors");
const PROPOSALS: TableDefinition<u64, &[u8]> = TableDefinition::new("proposals");
const EVALUATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("evaluations");
const REPORTS: TableDefinition<u64, &[u8]> = TableDefinition::new("reports");
const GRANTS: TableDefinition<u64, &[u8]> = TableDefinition::new("grants");
const BUDGETS: TableDefinition<u64, &[u8]> = TableDefinition::new("budgets");
const DEPARTMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("departments");
const NOTIFICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("notifications");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const META_KEY: &str = "state";

/// Header row of the `meta` table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Meta {
    revision: u64,
    opening_budget: Amount,
    counters: Counters,
}

fn db_err(err: impl std::fmt::Display) -> RgmsError {
    RgmsError::persistence(format!("redb: {err}"))
}

// =============================================================================
// STORE
// =============================================================================

/// Tracker state stored in a redb database file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Create (or open) a database file and seed it with `tracker` if empty.
    pub fn create(path: &Path, tracker: &Tracker) -> Result<Self> {
        let store = Self {
            db: Database::create(path).map_err(db_err)?,
        };
        if store.stored_meta()?.is_none() {
            store.write(&tracker.snapshot(), None)?;
        }
        Ok(store)
    }

    /// Open an existing database file.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: Database::open(path).map_err(db_err)?,
        })
    }

    /// Revision currently committed, 0 for an empty database.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.stored_meta()?.map_or(0, |m| m.revision))
    }

    /// Load the full tracker state.
    pub fn load(&self) -> Result<Tracker> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let meta = read_meta(&txn)?.unwrap_or_default();
        let snapshot = TrackerSnapshot {
            revision: meta.revision,
            opening_budget: meta.opening_budget,
            counters: meta.counters,
            actors: read_rows(&txn, ACTORS)?,
            proposals: read_rows(&txn, PROPOSALS)?,
            evaluations: read_rows(&txn, EVALUATIONS)?,
            reports: read_rows(&txn, REPORTS)?,
            grants: read_rows(&txn, GRANTS)?,
            budgets: read_rows(&txn, BUDGETS)?,
            departments: read_rows(&txn, DEPARTMENTS)?,
            notifications: read_rows(&txn, NOTIFICATIONS)?,
        };
        debug!(revision = meta.revision, "tracker loaded from redb");
        Tracker::from_snapshot(snapshot)
    }

    /// Persist `tracker`, provided the stored revision is still
    /// `base_revision`.
    pub fn commit(&self, tracker: &Tracker, base_revision: u64) -> Result<()> {
        self.write(&tracker.snapshot(), Some(base_revision))
    }

    fn stored_meta(&self) -> Result<Option<Meta>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        read_meta(&txn)
    }

    fn write(&self, snapshot: &TrackerSnapshot, expected: Option<u64>) -> Result<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        if let Some(base) = expected {
            let stored = locked_revision(&txn)?;
            if stored != base {
                txn.abort().map_err(db_err)?;
                return Err(RgmsError::Conflict(format!(
                    "state moved to revision {stored} since it was loaded at {base}"
                )));
            }
        }
        write_rows(&txn, ACTORS, snapshot.actors.iter().map(|a| (a.id.0, a)))?;
        write_rows(&txn, PROPOSALS, snapshot.proposals.iter().map(|p| (p.id.0, p)))?;
        write_rows(&txn, EVALUATIONS, snapshot.evaluations.iter().map(|e| (e.id.0, e)))?;
        write_rows(&txn, REPORTS, snapshot.reports.iter().map(|r| (r.id.0, r)))?;
        write_rows(&txn, GRANTS, snapshot.grants.iter().map(|g| (g.id.0, g)))?;
        write_rows(&txn, BUDGETS, snapshot.budgets.iter().map(|b| (b.grant.0, b)))?;
        write_rows(&txn, DEPARTMENTS, snapshot.departments.iter().map(|d| (d.hod.0, d)))?;
        write_rows(&txn, NOTIFICATIONS, snapshot.notifications.iter().map(|n| (n.id.0, n)))?;
        {
            let meta = Meta {
                revision: snapshot.revision,
                opening_budget: snapshot.opening_budget,
                counters: snapshot.counters,
            };
            let bytes = postcard::to_allocvec(&meta)?;
            let mut table = txn.open_table(META).map_err(db_err)?;
            table.insert(META_KEY, bytes.as_slice()).map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;
        debug!(revision = snapshot.revision, "tracker committed to redb");
        Ok(())
    }
}

// =============================================================================
// ROW HELPERS
// =============================================================================

fn read_meta(txn: &ReadTransaction) -> Result<Option<Meta>> {
    let table = match txn.open_table(META) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(db_err(err)),
    };
    let Some(guard) = table.get(META_KEY).map_err(db_err)? else {
        return Ok(None);
    };
    Ok(Some(postcard::from_bytes(guard.value())?))
}

/// Stored revision as seen by the pending write.
fn locked_revision(txn: &WriteTransaction) -> Result<u64> {
    let table = txn.open_table(META).map_err(db_err)?;
    let Some(guard) = table.get(META_KEY).map_err(db_err)? else {
        return Ok(0);
    };
    let meta: Meta = postcard::from_bytes(guard.value())?;
    Ok(meta.revision)
}

fn read_rows<T: DeserializeOwned>(
    txn: &ReadTransaction,
    def: TableDefinition<u64, &[u8]>,
) -> Result<Vec<T>> {
    let table = match txn.open_table(def) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(err) => return Err(db_err(err)),
    };
    let mut rows = Vec::new();
    for entry in table.iter().map_err(db_err)? {
        let (_, value) = entry.map_err(db_err)?;
        rows.push(postcard::from_bytes(value.value())?);
    }
    Ok(rows)
}

/// Replace the whole table with `rows`.
fn write_rows<'a, T: Serialize + 'a>(
    txn: &WriteTransaction,
    def: TableDefinition<u64, &[u8]>,
    rows: impl Iterator<Item = (u64, &'a T)>,
) -> Result<()> {
    txn.delete_table(def).map_err(db_err)?;
    let mut table = txn.open_table(def).map_err(db_err)?;
    for (id, row) in rows {
        let bytes = postcard::to_allocvec(row)?;
        table.insert(id, bytes.as_slice()).map_err(db_err)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Role};
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> (RedbStore, Tracker) {
        let mut tracker = Tracker::new();
        tracker.register_actor("hal", Role::Hod, "bio").unwrap();
        let store = RedbStore::create(&dir.path().join("state.redb"), &tracker).unwrap();
        (store, tracker)
    }

    #[test]
    fn create_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let (store, tracker) = seeded(&dir);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.snapshot(), tracker.snapshot());
    }

    #[test]
    fn commit_advances_the_stored_revision() {
        let dir = TempDir::new().unwrap();
        let (store, _) = seeded(&dir);
        let mut tracker = store.load().unwrap();
        let base = tracker.revision();
        let id = tracker.register_actor("ria", Role::Researcher, "bio").unwrap();
        store.commit(&tracker, base).unwrap();

        assert_eq!(store.revision().unwrap(), tracker.revision());
        let reloaded = store.load().unwrap();
        assert!(reloaded.actor(id).and_then(Actor::as_researcher).is_ok());
    }

    #[test]
    fn stale_commit_is_a_conflict_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let (store, _) = seeded(&dir);
        let mut first = store.load().unwrap();
        let mut second = store.load().unwrap();
        let base = first.revision();

        first.register_actor("ria", Role::Researcher, "bio").unwrap();
        store.commit(&first, base).unwrap();

        second.register_actor("ron", Role::Reviewer, "bio").unwrap();
        let err = store.commit(&second, base).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
        assert_eq!(store.load().unwrap().snapshot(), first.snapshot());
    }

    #[test]
    fn loads_proceed_while_a_write_is_open() {
        let dir = TempDir::new().unwrap();
        let (store, tracker) = seeded(&dir);
        let pending = store.db.begin_write().unwrap();
        assert_eq!(store.revision().unwrap(), tracker.revision());
        assert_eq!(store.load().unwrap().snapshot(), tracker.snapshot());
        pending.abort().unwrap();
    }

    #[test]
    fn empty_database_reads_as_fresh_state() {
        let dir = TempDir::new().unwrap();
        let store = RedbStore {
            db: Database::create(dir.path().join("empty.redb")).unwrap(),
        };
        assert_eq!(store.revision().unwrap(), 0);
        assert_eq!(store.load().unwrap().actors().count(), 0);
    }

    #[test]
    fn reopen_keeps_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        let tracker = {
            let mut t = Tracker::new();
            t.register_actor("hal", Role::Hod, "bio").unwrap();
            RedbStore::create(&path, &t).unwrap();
            t
        };
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap().snapshot(), tracker.snapshot());
    }
}
