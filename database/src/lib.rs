use core::ops::Range;
use std::{
    borrow::Cow,
    collections::{btree_map::Entry, BTreeMap, HashMap},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use anyhow::{bail, ensure, Context as _, Result};
use bytesize::ByteSize;
use im::OrdMap;
use libmdbx::{DatabaseFlags, Environment, Geometry, WriteFlags, RO};
use log::{debug, info};
use snap::raw::{Decoder, Encoder};
use thiserror::Error;
use unwrap_none::UnwrapNone as _;

pub use crate::{
    config::DatabaseConfig,
    transaction::{Transaction, TransactionState},
};

mod config;
mod transaction;

const GROWTH_STEP: ByteSize = ByteSize::mib(256);
const MAX_NAMED_DATABASES: usize = 10;

/// A key type whose string representation starts with a fixed prefix.
///
/// Keys of different types share one keyspace, so prefixes must not be prefixes of each other.
pub trait PrefixableKey {
    const PREFIX: &'static str;

    #[must_use]
    fn has_prefix(bytes: &[u8]) -> bool {
        bytes.starts_with(Self::PREFIX.as_bytes())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DatabaseMode {
    ReadOnly,
    ReadWrite,
}

impl DatabaseMode {
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    #[must_use]
    pub const fn mode_permissions(self) -> u16 {
        match self {
            // <https://erthink.github.io/libmdbx/group__c__opening.html#gabb7dd3b10dd31639ba252df545e11768>
            // The UNIX permissions to set on created files. Zero value means to open existing, but do not create.
            Self::ReadOnly => 0,
            Self::ReadWrite => 0o600,
        }
    }

    #[must_use]
    #[cfg(target_os = "linux")]
    pub fn permissions(self) -> u32 {
        self.mode_permissions().into()
    }

    #[must_use]
    #[cfg(not(target_os = "linux"))]
    pub const fn permissions(self) -> u16 {
        self.mode_permissions()
    }
}

/// A sorted key-value store with snapshot transactions.
///
/// All writes go through [`Transaction`]s. Committed reads made directly on the [`Database`]
/// behave like single-operation transactions.
pub struct Database {
    kind: DatabaseKind,
    mode: DatabaseMode,
    // Commits are serialized by this lock. Snapshots are taken while holding it,
    // which makes every snapshot correspond to a single commit sequence number.
    commit_log: Mutex<CommitLog>,
}

impl Database {
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        match config {
            DatabaseConfig::InMemory => Ok(Self::in_memory()),
            DatabaseConfig::Persistent {
                name,
                directory,
                max_size,
                read_only,
            } => {
                let mode = if *read_only {
                    DatabaseMode::ReadOnly
                } else {
                    DatabaseMode::ReadWrite
                };

                Self::persistent(name, directory, *max_size, mode)
            }
        }
    }

    pub fn persistent(
        name: &str,
        directory: impl AsRef<Path>,
        max_size: ByteSize,
        mode: DatabaseMode,
    ) -> Result<Self> {
        let directory = directory.as_ref();

        ensure!(directory.to_str().is_some(), Error::InvalidDirectory);

        if !mode.is_read_only() {
            fs_err::create_dir_all(directory)?;
        }

        let environment = Environment::builder()
            .set_max_dbs(MAX_NAMED_DATABASES)
            .set_geometry(Geometry {
                size: Some(..usize::try_from(max_size.as_u64())?),
                growth_step: Some(isize::try_from(GROWTH_STEP.as_u64())?),
                shrink_threshold: None,
                page_size: None,
            })
            .open_with_permissions(directory, mode.permissions())
            .context(Error::BackendUnavailable)?;

        if !mode.is_read_only() {
            let transaction = environment
                .begin_rw_txn()
                .context(Error::BackendUnavailable)?;

            transaction
                .create_db(Some(name), DatabaseFlags::default())
                .context(Error::BackendUnavailable)?;

            transaction.commit().context(Error::BackendUnavailable)?;
        }

        info!("database: {} with name {name}", directory.display());

        Ok(Self {
            kind: DatabaseKind::Persistent {
                database_name: name.to_owned(),
                environment,
            },
            mode,
            commit_log: Mutex::default(),
        })
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kind: DatabaseKind::InMemory {
                map: Mutex::default(),
            },
            mode: DatabaseMode::ReadWrite,
            commit_log: Mutex::default(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> DatabaseMode {
        self.mode
    }

    pub fn begin_transaction(&self) -> Result<Transaction<'_>> {
        self.begin_transaction_inner(None)
    }

    /// Begins a transaction that is rolled back if it is still open after `deadline`.
    pub fn begin_transaction_with_deadline(&self, deadline: Instant) -> Result<Transaction<'_>> {
        self.begin_transaction_inner(Some(deadline))
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        self.snapshot()?.contains_key(key)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.snapshot()?.get(key)
    }

    /// Returns all pairs with keys in `range` in ascending order.
    pub fn range(&self, range: Range<impl AsRef<[u8]>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.snapshot()?.range(range)
    }

    /// Takes a read-only view of the data committed so far.
    ///
    /// Use this instead of separate `get` and `range` calls when several reads have to agree.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let kind = match &self.kind {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment
                    .begin_ro_txn()
                    .context(Error::BackendUnavailable)?;

                SnapshotKind::Persistent {
                    database_name: database_name.clone(),
                    transaction,
                }
            }
            DatabaseKind::InMemory { map } => SnapshotKind::InMemory {
                map: map
                    .lock()
                    .expect("in-memory database mutex is poisoned")
                    .clone(),
            },
        };

        Ok(Snapshot(kind))
    }

    fn begin_transaction_inner(&self, deadline: Option<Instant>) -> Result<Transaction<'_>> {
        let mut commit_log = self.lock_commit_log();
        let snapshot = self.snapshot()?;
        let start_sequence = commit_log.open_snapshot();

        Ok(Transaction::new(self, snapshot, start_sequence, deadline))
    }

    fn release_snapshot(&self, start_sequence: u64) {
        self.lock_commit_log().close_snapshot(start_sequence);
    }

    // `check` is called with every written key, the currently committed value, and the new value.
    fn commit_writes(
        &self,
        start_sequence: u64,
        writes: &BTreeMap<Vec<u8>, Vec<u8>>,
        mut check: impl FnMut(&[u8], Option<&[u8]>, &[u8]) -> Result<()>,
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        ensure!(!self.mode.is_read_only(), Error::ReadOnly);

        let mut commit_log = self.lock_commit_log();
        let latest = self.snapshot()?;

        for (key, value) in writes {
            let committed = latest.get(key)?;

            let written_concurrently = commit_log
                .last_written(key)
                .is_some_and(|sequence| sequence > start_sequence);

            if written_concurrently && committed.as_ref() != Some(value) {
                bail!(Error::WriteConflict { key: key.clone() });
            }

            check(key, committed.as_deref(), value)?;
        }

        // Release the read-only transaction before writing.
        drop(latest);

        self.write_batch(writes)?;

        let sequence = commit_log.record(writes.keys());

        debug!("committed {} keys at sequence {sequence}", writes.len());

        Ok(())
    }

    fn write_batch(&self, pairs: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        match &self.kind {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => write_persistent_batch(database_name, environment, pairs)
                .context(Error::BackendUnavailable)?,
            DatabaseKind::InMemory { map } => {
                // Compress everything before touching the map so that a failure leaves it intact.
                let compressed = pairs
                    .iter()
                    .map(|(key, value)| {
                        let key = Arc::<[u8]>::from(key.as_slice());
                        let value = Arc::<[u8]>::from(compress(value)?);
                        Ok((key, value))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let mut map = map.lock().expect("in-memory database mutex is poisoned");
                let mut new_map = map.clone();

                new_map.extend(compressed);

                *map = new_map;
            }
        }

        Ok(())
    }

    fn lock_commit_log(&self) -> MutexGuard<'_, CommitLog> {
        self.commit_log
            .lock()
            .expect("database commit log mutex is poisoned")
    }
}

enum DatabaseKind {
    Persistent {
        database_name: String,
        environment: Environment,
    },
    InMemory {
        // Cloning an `OrdMap` is cheap, which makes it suitable for snapshots.
        // The elements are `Arc`s so that cloning them is cheap too.
        map: Mutex<InMemoryMap>,
    },
}

/// A consistent read-only view of committed data.
///
/// Commits made after the snapshot was taken are not visible through it.
pub struct Snapshot(SnapshotKind);

impl Snapshot {
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        self.0.contains_key(key.as_ref())
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.0.get(key.as_ref())
    }

    /// Returns all pairs with keys in `range` in ascending order.
    pub fn range(&self, range: Range<impl AsRef<[u8]>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.0.range(range.start.as_ref()..range.end.as_ref())
    }
}

enum SnapshotKind {
    Persistent {
        database_name: String,
        transaction: libmdbx::Transaction<RO>,
    },
    InMemory {
        map: InMemoryMap,
    },
}

impl SnapshotKind {
    fn contains_key(&self, key: &[u8]) -> Result<bool> {
        match self {
            Self::Persistent {
                database_name,
                transaction,
            } => {
                let database = transaction
                    .open_db(Some(database_name))
                    .context(Error::BackendUnavailable)?;

                let contains_key = transaction
                    .get::<()>(database.dbi(), key)
                    .context(Error::BackendUnavailable)?
                    .is_some();

                Ok(contains_key)
            }
            Self::InMemory { map } => Ok(map.contains_key(key)),
        }
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Persistent {
                database_name,
                transaction,
            } => {
                let database = transaction
                    .open_db(Some(database_name))
                    .context(Error::BackendUnavailable)?;

                transaction
                    .get::<Cow<_>>(database.dbi(), key)
                    .context(Error::BackendUnavailable)?
                    .map(|compressed| decompress(&compressed))
            }
            Self::InMemory { map } => map.get(key).map(|compressed| decompress(compressed)),
        }
        .transpose()
    }

    fn range(&self, range: Range<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let Range { start, end } = range;

        if start >= end {
            return Ok(vec![]);
        }

        match self {
            Self::Persistent {
                database_name,
                transaction,
            } => {
                let database = transaction
                    .open_db(Some(database_name))
                    .context(Error::BackendUnavailable)?;

                let mut cursor = transaction
                    .cursor(&database)
                    .context(Error::BackendUnavailable)?;

                let mut pairs = vec![];

                let mut next = cursor
                    .set_range::<Cow<[u8]>, Cow<[u8]>>(start)
                    .context(Error::BackendUnavailable)?;

                while let Some((key, compressed)) = next {
                    if *key >= *end {
                        break;
                    }

                    pairs.push((key.into_owned(), decompress(&compressed)?));

                    next = cursor
                        .next::<Cow<[u8]>, Cow<[u8]>>()
                        .context(Error::BackendUnavailable)?;
                }

                Ok(pairs)
            }
            Self::InMemory { map } => {
                let start_pair = map.get_key_value(start);
                let (_, mut above) = map.split(start);

                if let Some((key, value)) = start_pair {
                    above
                        .insert(Arc::clone(key), Arc::clone(value))
                        .expect_none("start_pair should have been discarded by OrdMap::split");
                }

                let (in_range, _) = above.split(end);

                in_range
                    .into_iter()
                    .map(|(key, value)| Ok((key.to_vec(), decompress(&value)?)))
                    .collect()
            }
        }
    }
}

/// Tracks which keys were written by which commit.
///
/// Entries are only needed while some transaction that began before them is still open.
#[derive(Default)]
struct CommitLog {
    sequence: u64,
    key_sequences: HashMap<Vec<u8>, u64>,
    // Start sequences of open transactions with their counts.
    open_snapshots: BTreeMap<u64, usize>,
}

impl CommitLog {
    fn open_snapshot(&mut self) -> u64 {
        *self.open_snapshots.entry(self.sequence).or_default() += 1;
        self.sequence
    }

    fn close_snapshot(&mut self, start_sequence: u64) {
        if let Entry::Occupied(mut entry) = self.open_snapshots.entry(start_sequence) {
            *entry.get_mut() -= 1;

            if *entry.get() == 0 {
                entry.remove();
            }
        }

        self.prune();
    }

    fn last_written(&self, key: &[u8]) -> Option<u64> {
        self.key_sequences.get(key).copied()
    }

    fn record<'keys>(&mut self, keys: impl IntoIterator<Item = &'keys Vec<u8>>) -> u64 {
        self.sequence += 1;

        for key in keys {
            self.key_sequences.insert(key.clone(), self.sequence);
        }

        self.prune();

        self.sequence
    }

    fn prune(&mut self) {
        match self.open_snapshots.keys().next().copied() {
            Some(oldest) => self
                .key_sequences
                .retain(|_, sequence| *sequence > oldest),
            None => self.key_sequences.clear(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("database directory path should be a valid Unicode string")]
    InvalidDirectory,
    #[error("database backend is unavailable")]
    BackendUnavailable,
    #[error("database is opened in read-only mode")]
    ReadOnly,
    #[error("transaction is no longer active (state: {state:?})")]
    TransactionNotActive { state: TransactionState },
    #[error("transaction deadline exceeded")]
    DeadlineExceeded,
    #[error("key was written by a concurrent transaction: {}", String::from_utf8_lossy(.key))]
    WriteConflict { key: Vec<u8> },
}

type InMemoryMap = OrdMap<Arc<[u8]>, Arc<[u8]>>;

fn write_persistent_batch(
    database_name: &str,
    environment: &Environment,
    pairs: &BTreeMap<Vec<u8>, Vec<u8>>,
) -> Result<()> {
    let transaction = environment.begin_rw_txn()?;
    let database = transaction.open_db(Some(database_name))?;

    for (key, value) in pairs {
        let compressed = compress(value)?;
        transaction.put(database.dbi(), key, compressed, WriteFlags::default())?;
    }

    transaction.commit()?;

    Ok(())
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new().compress_vec(data).map_err(Into::into)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new().decompress_vec(data).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;

    // The `TempDir` has to outlive the `Database`.
    type Constructor = fn() -> Result<(Database, Option<TempDir>)>;

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_get_and_contains_key(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert_eq!(database.get("A")?, Some(to_bytes("1")));
        assert_eq!(database.get("D")?, None);
        assert!(database.contains_key("E")?);
        assert!(!database.contains_key("F")?);

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_range_is_half_open(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert_pairs_eq(database.range("A".."E")?, [("A", "1"), ("B", "2"), ("C", "3")])?;
        assert_pairs_eq(database.range("B".."F")?, [("B", "2"), ("C", "3"), ("E", "5")])?;
        assert_pairs_eq(database.range("0".."A")?, [])?;
        assert_pairs_eq(database.range("D".."E")?, [])?;

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_inverted_range_is_empty(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        assert_pairs_eq(database.range("E".."A")?, [])?;

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_transaction_reads_its_own_writes(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut transaction = database.begin_transaction()?;

        transaction.put("B", "20")?;
        transaction.put("D", "4")?;

        assert_eq!(transaction.get("B")?, Some(to_bytes("20")));
        assert!(transaction.contains_key("D")?);

        assert_pairs_eq(
            transaction.range("A".."F")?,
            [("A", "1"), ("B", "20"), ("C", "3"), ("D", "4"), ("E", "5")],
        )?;

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_uncommitted_writes_are_isolated(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut writer = database.begin_transaction()?;
        let reader = database.begin_transaction()?;

        writer.put("D", "4")?;

        assert_eq!(database.get("D")?, None);
        assert_eq!(reader.get("D")?, None);

        writer.commit()?;

        assert_eq!(database.get("D")?, Some(to_bytes("4")));

        // `reader` began before the commit and keeps its snapshot.
        assert_eq!(reader.get("D")?, None);
        assert_eq!(database.begin_transaction()?.get("D")?, Some(to_bytes("4")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_rollback_discards_writes(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut transaction = database.begin_transaction()?;

        transaction.put("D", "4")?;
        transaction.rollback();

        assert_eq!(transaction.state(), TransactionState::RolledBack);
        assert_eq!(database.get("D")?, None);

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_dropping_active_transaction_rolls_back(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        {
            let mut transaction = database.begin_transaction()?;
            transaction.put("D", "4")?;
        }

        assert_eq!(database.get("D")?, None);
        assert!(database.lock_commit_log().open_snapshots.is_empty());

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_rollback_after_commit_is_a_no_op(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut transaction = database.begin_transaction()?;

        transaction.put("D", "4")?;
        transaction.commit()?;
        transaction.rollback();

        assert_eq!(transaction.state(), TransactionState::Committed);
        assert_eq!(database.get("D")?, Some(to_bytes("4")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_finished_transaction_rejects_operations(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut committed = database.begin_transaction()?;
        let mut rolled_back = database.begin_transaction()?;

        committed.commit()?;
        rolled_back.rollback();

        for (transaction, state) in [
            (&mut committed, TransactionState::Committed),
            (&mut rolled_back, TransactionState::RolledBack),
        ] {
            for error in [
                transaction.get("A").unwrap_err(),
                transaction.put("A", "0").unwrap_err(),
                transaction.commit().unwrap_err(),
            ] {
                assert!(matches!(
                    error.downcast_ref(),
                    Some(Error::TransactionNotActive { state: actual }) if *actual == state,
                ));
            }
        }

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_concurrent_writes_to_the_same_key_conflict(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut first = database.begin_transaction()?;
        let mut second = database.begin_transaction()?;

        first.put("A", "10")?;
        first.put("X", "x")?;
        second.put("A", "100")?;
        second.put("Y", "y")?;

        first.commit()?;

        let error = second.commit().unwrap_err();

        assert!(matches!(
            error.downcast_ref(),
            Some(Error::WriteConflict { key }) if key == b"A",
        ));

        assert_eq!(second.state(), TransactionState::RolledBack);
        assert_eq!(database.get("A")?, Some(to_bytes("10")));
        assert_eq!(database.get("X")?, Some(to_bytes("x")));
        assert_eq!(database.get("Y")?, None);

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_identical_concurrent_writes_do_not_conflict(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut first = database.begin_transaction()?;
        let mut second = database.begin_transaction()?;

        first.put("A", "10")?;
        second.put("A", "10")?;

        first.commit()?;
        second.commit()?;

        assert_eq!(database.get("A")?, Some(to_bytes("10")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_sequential_updates_do_not_conflict(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;

        for value in ["10", "11", "12"] {
            let mut transaction = database.begin_transaction()?;
            transaction.put("A", value)?;
            transaction.commit()?;
        }

        assert_eq!(database.get("A")?, Some(to_bytes("12")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_rejected_check_rolls_back(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut transaction = database.begin_transaction()?;

        transaction.put("A", "10")?;
        transaction.put("D", "4")?;

        let result = transaction.commit_checked(|key, committed, _| {
            ensure!(key != b"A" || committed.is_none(), "A is immutable");
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(transaction.state(), TransactionState::RolledBack);
        assert_eq!(database.get("A")?, Some(to_bytes("1")));
        assert_eq!(database.get("D")?, None);

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_deadline_rolls_back_before_reporting(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let mut expired = database.begin_transaction_with_deadline(Instant::now())?;

        let error = expired.put("D", "4").unwrap_err();

        assert!(matches!(error.downcast_ref(), Some(Error::DeadlineExceeded)));
        assert_eq!(expired.state(), TransactionState::RolledBack);

        let deadline = Instant::now() + Duration::from_secs(3600);
        let mut open = database.begin_transaction_with_deadline(deadline)?;

        open.put("D", "4")?;
        open.commit()?;

        assert_eq!(database.get("D")?, Some(to_bytes("4")));

        Ok(())
    }

    #[test_case(build_persistent_database)]
    #[test_case(build_in_memory_database)]
    fn test_snapshot_is_unaffected_by_later_commits(constructor: Constructor) -> Result<()> {
        let (database, _directory) = constructor()?;
        let snapshot = database.snapshot()?;

        assert_eq!(snapshot.get("A")?, Some(to_bytes("1")));

        let mut transaction = database.begin_transaction()?;
        transaction.put("A", "10")?;
        transaction.put("D", "4")?;
        transaction.commit()?;

        assert_eq!(snapshot.get("A")?, Some(to_bytes("1")));
        assert!(!snapshot.contains_key("D")?);
        assert_pairs_eq(
            snapshot.range("A".."Z")?,
            [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")],
        )?;

        assert_eq!(database.snapshot()?.get("A")?, Some(to_bytes("10")));

        Ok(())
    }

    #[test]
    fn test_commit_log_is_pruned_when_no_transactions_are_open() -> Result<()> {
        let (database, _directory) = build_in_memory_database()?;
        let old = database.begin_transaction()?;
        let mut transaction = database.begin_transaction()?;

        transaction.put("A", "10")?;
        transaction.commit()?;

        assert_eq!(database.lock_commit_log().last_written(b"A"), Some(1));

        drop(old);

        assert_eq!(database.lock_commit_log().last_written(b"A"), None);

        Ok(())
    }

    #[test]
    fn test_transactions_on_multiple_threads() -> Result<()> {
        let (database, _directory) = build_in_memory_database()?;

        std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|thread| {
                    let database = &database;

                    scope.spawn(move || -> Result<()> {
                        for index in 0..16 {
                            let mut transaction = database.begin_transaction()?;
                            transaction.put(format!("T{thread}-{index:02}"), "v")?;
                            transaction.commit()?;
                        }

                        Ok(())
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .try_for_each(|handle| handle.join().expect("thread should not panic"))
        })?;

        assert_eq!(database.range("T".."U")?.len(), 8 * 16);

        Ok(())
    }

    #[test]
    fn test_persistent_database_survives_reopening() -> Result<()> {
        let directory = TempDir::new()?;

        {
            let database = build_database_in(&directory)?;
            populate_database(&database)?;
        }

        let database = build_database_in(&directory)?;

        assert_pairs_eq(
            database.range("A".."Z")?,
            [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")],
        )?;

        Ok(())
    }

    #[test]
    fn test_read_only_database_rejects_writes() -> Result<()> {
        let directory = TempDir::new()?;

        {
            let database = build_database_in(&directory)?;
            populate_database(&database)?;
        }

        let database = Database::persistent(
            "test_db",
            directory.path(),
            ByteSize::mib(1),
            DatabaseMode::ReadOnly,
        )?;

        assert_eq!(database.get("A")?, Some(to_bytes("1")));

        let error = database.begin_transaction()?.put("A", "0").unwrap_err();

        assert!(matches!(error.downcast_ref(), Some(Error::ReadOnly)));

        Ok(())
    }

    fn build_persistent_database() -> Result<(Database, Option<TempDir>)> {
        let directory = TempDir::new()?;
        let database = build_database_in(&directory)?;
        populate_database(&database)?;
        Ok((database, Some(directory)))
    }

    fn build_in_memory_database() -> Result<(Database, Option<TempDir>)> {
        let database = Database::in_memory();
        populate_database(&database)?;
        Ok((database, None))
    }

    fn build_database_in(directory: &TempDir) -> Result<Database> {
        Database::persistent(
            "test_db",
            directory.path(),
            ByteSize::mib(1),
            DatabaseMode::ReadWrite,
        )
    }

    fn populate_database(database: &Database) -> Result<()> {
        let mut transaction = database.begin_transaction()?;

        for (key, value) in [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")] {
            transaction.put(key, value)?;
        }

        transaction.commit()
    }

    fn assert_pairs_eq<'strings>(
        actual_pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
        expected_pairs: impl IntoIterator<Item = (&'strings str, &'strings str)>,
    ) -> Result<()> {
        let actual_pairs = to_string_pairs(actual_pairs)?;
        let expected_pairs = to_string_pairs(expected_pairs)?;

        assert_eq!(actual_pairs, expected_pairs);

        Ok(())
    }

    fn to_string_pairs(
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<Vec<(String, String)>> {
        pairs
            .into_iter()
            .map(|(key, value)| {
                let key_string = core::str::from_utf8(key.as_ref())?;
                let value_string = core::str::from_utf8(value.as_ref())?;
                Ok((key_string.to_owned(), value_string.to_owned()))
            })
            .collect()
    }

    fn to_bytes(string: &str) -> Vec<u8> {
        string.as_bytes().to_vec()
    }
}
