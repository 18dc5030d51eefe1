use core::{
    cell::Cell,
    ops::{Bound, Range},
};
use std::{collections::BTreeMap, time::Instant};

use anyhow::{bail, ensure, Result};
use log::debug;

use crate::{Database, Error, Snapshot};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A unit of work over a [`Database`].
///
/// Reads see the data committed when the transaction began plus the transaction's own writes.
/// Writes are buffered until [`Transaction::commit`]. A transaction that is dropped while still
/// active is rolled back.
pub struct Transaction<'database> {
    database: &'database Database,
    snapshot: Snapshot,
    start_sequence: u64,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
    state: Cell<TransactionState>,
    deadline: Option<Instant>,
}

impl<'database> Transaction<'database> {
    pub(crate) const fn new(
        database: &'database Database,
        snapshot: Snapshot,
        start_sequence: u64,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            database,
            snapshot,
            start_sequence,
            writes: BTreeMap::new(),
            state: Cell::new(TransactionState::Active),
            deadline,
        }
    }

    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state.get()
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        self.ensure_active()?;

        let key = key.as_ref();

        if self.writes.contains_key(key) {
            return Ok(true);
        }

        self.snapshot.contains_key(key)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.ensure_active()?;

        let key = key.as_ref();

        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }

        self.snapshot.get(key)
    }

    /// Returns all pairs with keys in `range` in ascending order, including uncommitted writes.
    pub fn range(&self, range: Range<impl AsRef<[u8]>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_active()?;

        let start = range.start.as_ref();
        let end = range.end.as_ref();

        if start >= end {
            return Ok(vec![]);
        }

        let mut pairs = self
            .snapshot
            .range(start..end)?
            .into_iter()
            .collect::<BTreeMap<_, _>>();

        let bounds: (Bound<&[u8]>, Bound<&[u8]>) = (Bound::Included(start), Bound::Excluded(end));

        for (key, value) in self.writes.range::<[u8], _>(bounds) {
            pairs.insert(key.clone(), value.clone());
        }

        Ok(pairs.into_iter().collect())
    }

    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.ensure_active()?;

        ensure!(!self.database.mode().is_read_only(), Error::ReadOnly);

        self.writes
            .insert(key.as_ref().to_vec(), value.as_ref().to_vec());

        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.commit_checked(|_, _, _| Ok(()))
    }

    /// Commits after calling `check` with every written key, its committed value, and the new
    /// value. All calls happen under the commit lock. If `check` fails, nothing is written.
    ///
    /// The transaction is rolled back if the commit fails for any reason.
    pub fn commit_checked(
        &mut self,
        check: impl FnMut(&[u8], Option<&[u8]>, &[u8]) -> Result<()>,
    ) -> Result<()> {
        self.ensure_active()?;

        let writes = core::mem::take(&mut self.writes);
        let result = self
            .database
            .commit_writes(self.start_sequence, &writes, check);

        match result {
            Ok(()) => self.finish(TransactionState::Committed),
            Err(_) => {
                debug!("transaction rolled back after failed commit");
                self.finish(TransactionState::RolledBack);
            }
        }

        result
    }

    /// Discards buffered writes. Does nothing if the transaction is no longer active.
    pub fn rollback(&mut self) {
        if self.state() == TransactionState::Active {
            self.writes.clear();
            self.finish(TransactionState::RolledBack);
            debug!("transaction rolled back");
        }
    }

    fn ensure_active(&self) -> Result<()> {
        let state = self.state();

        ensure!(
            state == TransactionState::Active,
            Error::TransactionNotActive { state },
        );

        if self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            self.finish(TransactionState::RolledBack);
            debug!("transaction rolled back after deadline");
            bail!(Error::DeadlineExceeded);
        }

        Ok(())
    }

    fn finish(&self, state: TransactionState) {
        if self.state.replace(state) == TransactionState::Active {
            self.database.release_snapshot(self.start_sequence);
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}
