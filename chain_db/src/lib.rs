//! Typed storage for Beacon Chain data on top of [`Database`].
//!
//! All writes happen in a [`Transaction`] obtained from [`ChainDb::begin_tx`]. The transaction is
//! passed explicitly to every setter and provider that should take part in it. Providers called on
//! [`ChainDb`] itself read committed data.
//!
//! Every provider call on [`ChainDb`] reads from a single snapshot, so it never observes part of a
//! commit.
//!
//! Entity families are exposed as capability traits. Providers are implemented for every
//! [`ReadStore`] and setters for every [`WriteStore`], so code that only needs to read blocks can
//! be generic over `impl BlocksProvider`.

use core::{ops::Range, time::Duration};
use std::time::Instant;

use anyhow::{ensure, Result};
use database::{Database, DatabaseConfig, PrefixableKey as _, Snapshot, TransactionState};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::{
    containers::BeaconCommittee,
    primitives::{CommitteeIndex, Slot, H256},
};

pub use crate::{
    providers::{
        AttestationsProvider, AttesterSlashingsProvider, BeaconCommitteesProvider, BlocksProvider,
        MetadataProvider, ProposerDutiesProvider, ProposerSlashingsProvider, ValidatorsProvider,
        VoluntaryExitsProvider, MAX_EMPTY_SLOTS_RANGE_LENGTH,
    },
    setters::{
        AttestationsSetter, AttesterSlashingsSetter, BeaconCommitteesSetter, BlocksSetter,
        MetadataSetter, ProposerDutiesSetter, ProposerSlashingsSetter, ValidatorsSetter,
        VoluntaryExitsSetter,
    },
    store::{ReadStore, StoreView, WriteStore},
};

use crate::keys::BeaconCommitteeBySlotAndIndex;

mod keys;
mod providers;
mod setters;
mod store;

#[cfg(test)]
mod fixtures;

pub const CURRENT_SCHEMA_VERSION: u64 = 1;

const SCHEMA_KEY: &str = "schema";

#[derive(Deserialize, Serialize)]
struct Schema {
    version: u64,
}

pub struct ChainDb {
    database: Database,
}

impl ChainDb {
    /// Wraps `database`, recording the schema version if it has not been recorded yet.
    pub fn new(database: Database) -> Result<Self> {
        let chain_db = Self { database };

        chain_db.initialize_schema()?;

        Ok(chain_db)
    }

    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Self::new(Database::open(config)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Database::in_memory())
    }

    pub fn begin_tx(&self) -> Result<Transaction<'_>> {
        let inner = self.database.begin_transaction()?;
        Ok(Transaction { inner })
    }

    pub fn begin_tx_with_deadline(&self, deadline: Instant) -> Result<Transaction<'_>> {
        let inner = self.database.begin_transaction_with_deadline(deadline)?;
        Ok(Transaction { inner })
    }

    /// Begins a transaction that is rolled back if it is still open after `timeout`.
    ///
    /// Timeouts too long to be represented are treated as no timeout.
    pub fn begin_tx_with_timeout(&self, timeout: Duration) -> Result<Transaction<'_>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.begin_tx_with_deadline(deadline),
            None => self.begin_tx(),
        }
    }

    fn initialize_schema(&self) -> Result<()> {
        if let Some(Schema { version }) = self.metadata_json(SCHEMA_KEY)? {
            ensure!(
                version == CURRENT_SCHEMA_VERSION,
                Error::UnsupportedSchemaVersion {
                    found: version,
                    supported: CURRENT_SCHEMA_VERSION,
                },
            );

            return Ok(());
        }

        if self.database.mode().is_read_only() {
            return Ok(());
        }

        let mut transaction = self.begin_tx()?;

        transaction.set_metadata_json(
            SCHEMA_KEY,
            &Schema {
                version: CURRENT_SCHEMA_VERSION,
            },
        )?;

        transaction.commit_tx()?;

        debug!("initialized chain database schema version {CURRENT_SCHEMA_VERSION}");

        Ok(())
    }
}

impl ReadStore for ChainDb {
    fn read<T>(&self, read: impl FnOnce(&dyn StoreView) -> Result<T>) -> Result<T> {
        read(&self.database.snapshot()?)
    }
}

impl StoreView for Snapshot {
    fn get_bytes(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get(key)
    }

    fn range_bytes(&self, range: Range<Vec<u8>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.range(range)
    }
}

/// An explicit transaction handle.
///
/// Dropping an active transaction rolls it back.
pub struct Transaction<'db> {
    inner: database::Transaction<'db>,
}

impl Transaction<'_> {
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.state()
    }

    /// Makes all writes visible at once.
    ///
    /// Fails and rolls back if another transaction committed a different value for one of the
    /// written keys after this one began, or if a different beacon committee is already stored
    /// for the same slot and index.
    pub fn commit_tx(&mut self) -> Result<()> {
        self.inner.commit_checked(|key, committed, new| {
            if !BeaconCommitteeBySlotAndIndex::has_prefix(key) {
                return Ok(());
            }

            if committed.is_some_and(|committed| committed != new) {
                let BeaconCommittee { slot, index, .. } = store::deserialize_value(new)?;
                return Err(Error::CommitteeConflict { slot, index }.into());
            }

            Ok(())
        })
    }

    /// Discards all writes. Does nothing if the transaction has already been committed.
    pub fn rollback(&mut self) {
        self.inner.rollback();
    }
}

impl ReadStore for Transaction<'_> {
    fn read<T>(&self, read: impl FnOnce(&dyn StoreView) -> Result<T>) -> Result<T> {
        read(self)
    }
}

impl StoreView for Transaction<'_> {
    fn get_bytes(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn range_bytes(&self, range: Range<Vec<u8>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.range(range)
    }
}

impl WriteStore for Transaction<'_> {
    fn put_bytes(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner.put(key, value)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("block not found in storage: {block_root:?}")]
    BlockNotFound { block_root: H256 },
    #[error("beacon committee not found in storage (slot: {slot}, index: {index})")]
    BeaconCommitteeNotFound { slot: Slot, index: CommitteeIndex },
    #[error("a different beacon committee is already stored (slot: {slot}, index: {index})")]
    CommitteeConflict { slot: Slot, index: CommitteeIndex },
    #[error("block root does not match block header (stored: {stored:?}, computed: {computed:?})")]
    BlockRootMismatch { stored: H256, computed: H256 },
    #[error("unsupported schema version: {found} (supported: {supported})")]
    UnsupportedSchemaVersion { found: u64, supported: u64 },
    #[error("slot range {min_slot}..={max_slot} is longer than {limit} slots")]
    SlotRangeTooLong {
        min_slot: Slot,
        max_slot: Slot,
        limit: u64,
    },
    #[error("storage key has incorrect prefix: {bytes:?}")]
    IncorrectPrefix { bytes: Vec<u8> },
}
