use std::collections::BTreeSet;

use sha2::{Digest as _, Sha256};

use crate::{
    containers::{AttesterSlashing, Block, BlockHeader, Validator, ValidatorStatus},
    primitives::{Epoch, ValidatorIndex, H256},
};

impl BlockHeader {
    /// Computes `hash_tree_root` as defined by SSZ.
    ///
    /// The header has 5 fields, so the Merkle tree has 8 leaves with the last 3 being zero chunks.
    #[must_use]
    pub fn hash_tree_root(&self) -> H256 {
        let leaves = [
            uint_chunk(self.slot),
            uint_chunk(self.proposer_index),
            self.parent_root,
            self.state_root,
            self.body_root,
            H256::zero(),
            H256::zero(),
            H256::zero(),
        ];

        let [a, b, c, d] = [
            hash_256_256(leaves[0], leaves[1]),
            hash_256_256(leaves[2], leaves[3]),
            hash_256_256(leaves[4], leaves[5]),
            hash_256_256(leaves[6], leaves[7]),
        ];

        hash_256_256(hash_256_256(a, b), hash_256_256(c, d))
    }
}

impl Block {
    /// Builds a block with everything but the header fields left at their defaults.
    #[must_use]
    pub fn new(header: BlockHeader) -> Self {
        let BlockHeader {
            slot,
            proposer_index,
            parent_root,
            state_root,
            body_root,
        } = header;

        Self {
            slot,
            proposer_index,
            parent_root,
            state_root,
            body_root,
            root: header.hash_tree_root(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn header(&self) -> BlockHeader {
        BlockHeader {
            slot: self.slot,
            proposer_index: self.proposer_index,
            parent_root: self.parent_root,
            state_root: self.state_root,
            body_root: self.body_root,
        }
    }
}

impl Validator {
    #[must_use]
    pub const fn status(&self, epoch: Epoch) -> ValidatorStatus {
        if epoch < self.activation_epoch {
            ValidatorStatus::Pending
        } else if epoch < self.exit_epoch {
            if self.slashed {
                ValidatorStatus::ActiveSlashed
            } else {
                ValidatorStatus::Active
            }
        } else if epoch < self.withdrawable_epoch {
            if self.slashed {
                ValidatorStatus::ExitedSlashed
            } else {
                ValidatorStatus::Exited
            }
        } else {
            ValidatorStatus::Withdrawable
        }
    }
}

impl AttesterSlashing {
    /// Returns the validators that attested to both conflicting attestations in ascending order.
    #[must_use]
    pub fn slashable_indices(&self) -> Vec<ValidatorIndex> {
        let indices_1 = self
            .attestation_1
            .attesting_indices
            .iter()
            .collect::<BTreeSet<_>>();

        let indices_2 = self
            .attestation_2
            .attesting_indices
            .iter()
            .collect::<BTreeSet<_>>();

        indices_1.intersection(&indices_2).copied().copied().collect()
    }
}

fn uint_chunk(value: u64) -> H256 {
    let mut chunk = H256::zero();
    chunk.as_bytes_mut()[..core::mem::size_of::<u64>()].copy_from_slice(&value.to_le_bytes());
    chunk
}

fn hash_256_256(left: H256, right: H256) -> H256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    H256(hasher.finalize().into())
}
