//! # redb-backed Record Store
//!
//! A disk-backed (or in-memory) record store using the redb embedded database.
//!
//! - ACID transactions with crash safety (copy-on-write B-trees)
//! - MVCC: concurrent readers, a single writer at a time
//! - Per-collection monotonic id counters kept in the `metadata` table
//!
//! ## Transaction Scopes
//!
//! All access goes through closures: [`RecordStore::write`] hands out a
//! [`WriteScope`] and commits when the closure returns `Ok`, aborting on
//! `Err`. [`RecordStore::read`] hands out a [`ReadScope`] over a consistent
//! snapshot. Both implement [`RecordReader`], so lookup helpers can be shared
//! between the read path and the check step of a check-then-write sequence.

use crate::EupravaError;
use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition,
    TableError, WriteTransaction, backends::InMemoryBackend,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for id counters: collection name -> last allocated id
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

/// Table holding the records of one collection: id -> serialized record bytes
const fn records(name: &'static str) -> TableDefinition<'static, u64, &'static [u8]> {
    TableDefinition::new(name)
}

/// Unique index table: key string -> record id
const fn index(name: &'static str) -> TableDefinition<'static, &'static str, u64> {
    TableDefinition::new(name)
}

fn storage_err(e: impl std::fmt::Display) -> EupravaError {
    EupravaError::Storage(e.to_string())
}

// =============================================================================
// RECORD TRAIT
// =============================================================================

/// A type stored in its own collection.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection (table) name. Must be unique across record types.
    const COLLECTION: &'static str;

    /// Human-readable name used in error messages.
    const KIND: &'static str;

    /// The record's id ([`RecordId::UNASSIGNED`](crate::RecordId::UNASSIGNED) before insertion).
    fn id(&self) -> crate::RecordId;

    /// Overwrite the record's id. Called by [`WriteScope::insert`].
    fn set_id(&mut self, id: crate::RecordId);
}

fn encode<R: Record>(record: &R) -> Result<Vec<u8>, EupravaError> {
    postcard::to_allocvec(record).map_err(|e| EupravaError::Serialization(e.to_string()))
}

fn decode<R: Record>(bytes: &[u8]) -> Result<R, EupravaError> {
    postcard::from_bytes(bytes).map_err(|e| EupravaError::Serialization(e.to_string()))
}

fn decode_one<R: Record>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: crate::RecordId,
) -> Result<Option<R>, EupravaError> {
    let found = match table.get(id.0).map_err(storage_err)? {
        Some(guard) => Some(decode::<R>(guard.value())?),
        None => None,
    };
    Ok(found)
}

fn decode_all<R: Record>(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> Result<Vec<R>, EupravaError> {
    let mut out = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (_, value) = entry.map_err(storage_err)?;
        out.push(decode::<R>(value.value())?);
    }
    Ok(out)
}

fn lookup_in(
    table: &impl ReadableTable<&'static str, u64>,
    key: &str,
) -> Result<Option<crate::RecordId>, EupravaError> {
    let found = table
        .get(key)
        .map_err(storage_err)?
        .map(|guard| crate::RecordId(guard.value()));
    Ok(found)
}

// =============================================================================
// READER TRAIT
// =============================================================================

/// Read access shared by [`ReadScope`] and [`WriteScope`].
pub trait RecordReader {
    /// Fetch a record by id.
    fn get<R: Record>(&self, id: crate::RecordId) -> Result<Option<R>, EupravaError>;

    /// All records of a collection in id (insertion) order.
    fn list<R: Record>(&self) -> Result<Vec<R>, EupravaError>;

    /// Resolve a unique index key to the record id that claimed it.
    fn lookup(&self, index: &'static str, key: &str)
    -> Result<Option<crate::RecordId>, EupravaError>;

    /// Fetch a record by id, failing with `NotFound` if it is absent.
    fn require<R: Record>(&self, id: crate::RecordId) -> Result<R, EupravaError> {
        self.get(id)?
            .ok_or_else(|| EupravaError::not_found(R::KIND, id))
    }

    /// First record (in id order) matching the predicate.
    fn find<R: Record>(&self, predicate: impl Fn(&R) -> bool) -> Result<Option<R>, EupravaError> {
        Ok(self.list::<R>()?.into_iter().find(|r| predicate(r)))
    }
}

// =============================================================================
// RECORD STORE
// =============================================================================

/// The redb database handle shared by a service.
pub struct RecordStore {
    db: Database,
    in_memory: bool,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("in_memory", &self.in_memory)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Open or create a record database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EupravaError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Self::initialize(db, false)
    }

    /// Create a store that lives only in memory.
    pub fn in_memory() -> Result<Self, EupravaError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::initialize(db, true)
    }

    fn initialize(db: Database, in_memory: bool) -> Result<Self, EupravaError> {
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _ = write_txn.open_table(METADATA).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(Self { db, in_memory })
    }

    /// Run `f` inside one write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`. redb admits one
    /// write transaction at a time, so everything `f` reads is still true
    /// when its writes land.
    pub fn write<T>(
        &self,
        f: impl FnOnce(&mut WriteScope<'_>) -> Result<T, EupravaError>,
    ) -> Result<T, EupravaError> {
        let txn = self.db.begin_write().map_err(storage_err)?;
        let result = {
            let mut scope = WriteScope { txn: &txn };
            f(&mut scope)
        };
        match result {
            Ok(value) => {
                txn.commit().map_err(storage_err)?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().map_err(storage_err)?;
                Err(e)
            }
        }
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&ReadScope) -> Result<T, EupravaError>,
    ) -> Result<T, EupravaError> {
        let txn = self.db.begin_read().map_err(storage_err)?;
        let scope = ReadScope { txn };
        f(&scope)
    }

    /// Shorthand for reading every record of a collection.
    pub fn list<R: Record>(&self) -> Result<Vec<R>, EupravaError> {
        self.read(|scope| scope.list::<R>())
    }

    /// Shorthand for fetching a single record, failing with `NotFound`.
    pub fn require<R: Record>(&self, id: crate::RecordId) -> Result<R, EupravaError> {
        self.read(|scope| scope.require::<R>(id))
    }
}

// =============================================================================
// READ SCOPE
// =============================================================================

/// Read-only view over one snapshot of the store.
pub struct ReadScope {
    txn: ReadTransaction,
}

impl ReadScope {
    fn records<R: Record>(
        &self,
    ) -> Result<Option<ReadOnlyTable<u64, &'static [u8]>>, EupravaError> {
        match self.txn.open_table(records(R::COLLECTION)) {
            Ok(table) => Ok(Some(table)),
            // Collection never written yet
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }
}

impl RecordReader for ReadScope {
    fn get<R: Record>(&self, id: crate::RecordId) -> Result<Option<R>, EupravaError> {
        match self.records::<R>()? {
            Some(table) => decode_one(&table, id),
            None => Ok(None),
        }
    }

    fn list<R: Record>(&self) -> Result<Vec<R>, EupravaError> {
        match self.records::<R>()? {
            Some(table) => decode_all(&table),
            None => Ok(Vec::new()),
        }
    }

    fn lookup(
        &self,
        name: &'static str,
        key: &str,
    ) -> Result<Option<crate::RecordId>, EupravaError> {
        match self.txn.open_table(index(name)) {
            Ok(table) => lookup_in(&table, key),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }
}

// =============================================================================
// WRITE SCOPE
// =============================================================================

/// Mutable view over an open write transaction.
pub struct WriteScope<'t> {
    txn: &'t WriteTransaction,
}

impl WriteScope<'_> {
    /// Allocate the next id of a collection.
    fn next_id(&mut self, collection: &'static str) -> Result<crate::RecordId, EupravaError> {
        let mut meta = self.txn.open_table(METADATA).map_err(storage_err)?;
        let last = meta
            .get(collection)
            .map_err(storage_err)?
            .map(|v| v.value())
            .unwrap_or(0);
        let next = last.saturating_add(1);
        meta.insert(collection, next).map_err(storage_err)?;
        Ok(crate::RecordId(next))
    }

    /// Assign a fresh id to `record` and store it.
    ///
    /// Any id the caller put on the record is overwritten.
    pub fn insert<R: Record>(&mut self, record: &mut R) -> Result<crate::RecordId, EupravaError> {
        let id = self.next_id(R::COLLECTION)?;
        record.set_id(id);
        self.put(record)?;
        Ok(id)
    }

    /// Store `record` under its current id, replacing any previous version.
    pub fn put<R: Record>(&mut self, record: &R) -> Result<(), EupravaError> {
        let bytes = encode(record)?;
        let mut table = self
            .txn
            .open_table(records(R::COLLECTION))
            .map_err(storage_err)?;
        table
            .insert(record.id().0, bytes.as_slice())
            .map_err(storage_err)?;
        Ok(())
    }

    /// Delete a record. Returns whether it existed.
    pub fn remove<R: Record>(&mut self, id: crate::RecordId) -> Result<bool, EupravaError> {
        let mut table = self
            .txn
            .open_table(records(R::COLLECTION))
            .map_err(storage_err)?;
        let existed = table.remove(id.0).map_err(storage_err)?.is_some();
        Ok(existed)
    }

    /// Claim `key` in a unique index for `id`.
    ///
    /// Returns `false` without writing if the key is already claimed.
    pub fn claim(
        &mut self,
        name: &'static str,
        key: &str,
        id: crate::RecordId,
    ) -> Result<bool, EupravaError> {
        let mut table = self.txn.open_table(index(name)).map_err(storage_err)?;
        if table.get(key).map_err(storage_err)?.is_some() {
            return Ok(false);
        }
        table.insert(key, id.0).map_err(storage_err)?;
        Ok(true)
    }

    /// Release a unique index key.
    pub fn release(&mut self, name: &'static str, key: &str) -> Result<(), EupravaError> {
        let mut table = self.txn.open_table(index(name)).map_err(storage_err)?;
        table.remove(key).map_err(storage_err)?;
        Ok(())
    }
}

impl RecordReader for WriteScope<'_> {
    fn get<R: Record>(&self, id: crate::RecordId) -> Result<Option<R>, EupravaError> {
        let table = self
            .txn
            .open_table(records(R::COLLECTION))
            .map_err(storage_err)?;
        decode_one(&table, id)
    }

    fn list<R: Record>(&self) -> Result<Vec<R>, EupravaError> {
        let table = self
            .txn
            .open_table(records(R::COLLECTION))
            .map_err(storage_err)?;
        decode_all(&table)
    }

    fn lookup(
        &self,
        name: &'static str,
        key: &str,
    ) -> Result<Option<crate::RecordId>, EupravaError> {
        let table = self.txn.open_table(index(name)).map_err(storage_err)?;
        lookup_in(&table, key)
    }
}

// =============================================================================
// TESTS
// =============================================================================
