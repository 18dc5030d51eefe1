use anyhow::Result;
use bytesize::ByteSize;
use database::{Database, DatabaseMode};
use tempfile::TempDir;
use types::{
    containers::{Block, BlockHeader},
    primitives::{Slot, H256},
};

use crate::ChainDb;

// The `TempDir` has to outlive the `ChainDb`.
pub type Constructor = fn() -> Result<(ChainDb, Option<TempDir>)>;

pub fn build_persistent_chain_db() -> Result<(ChainDb, Option<TempDir>)> {
    let directory = TempDir::new()?;

    let database = Database::persistent(
        "chain_db",
        directory.path(),
        ByteSize::mib(16),
        DatabaseMode::ReadWrite,
    )?;

    Ok((ChainDb::new(database)?, Some(directory)))
}

pub fn build_in_memory_chain_db() -> Result<(ChainDb, Option<TempDir>)> {
    Ok((ChainDb::in_memory()?, None))
}

pub fn block_at_slot(slot: Slot, parent_root: H256) -> Block {
    Block::new(BlockHeader {
        slot,
        parent_root,
        ..BlockHeader::default()
    })
}
