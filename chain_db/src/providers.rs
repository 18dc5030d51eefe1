use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{ensure, Result};
use database::PrefixableKey as _;
use serde::de::DeserializeOwned;
use types::{
    containers::{
        Attestation, AttesterDuty, AttesterSlashing, BeaconCommittee, Block, ProposerDuty,
        ProposerSlashing, Validator, ValidatorBalance, VoluntaryExit,
    },
    primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex, H256},
};

use crate::{
    keys::{
        self, AttestationById, AttestationIdByBeaconBlockRoot, AttestationIdBySlot,
        AttesterSlashingById, BeaconCommitteeBySlotAndIndex, BlockByRoot, BlockRootByParentRoot,
        BlockRootBySlot, MetadataByKey, ProposerDutyBySlot, ProposerSlashingIdBySlot,
        ValidatorBalanceByIndexAndEpoch, ValidatorByIndex, VoluntaryExitByValidatorAndEpoch,
    },
    store::{self, ReadStore},
    Error,
};

pub const MAX_EMPTY_SLOTS_RANGE_LENGTH: u64 = 1 << 20;

pub trait BlocksProvider {
    fn blocks_by_slot(&self, slot: Slot) -> Result<Vec<Block>>;

    /// Fails with [`Error::BlockNotFound`] if there is no block with the given root.
    fn block_by_root(&self, root: H256) -> Result<Block>;

    fn blocks_by_parent_root(&self, parent_root: H256) -> Result<Vec<Block>>;

    /// Returns the slots in `min_slot..=max_slot` that have no block stored.
    ///
    /// Fails with [`Error::SlotRangeTooLong`] if the range has more than
    /// [`MAX_EMPTY_SLOTS_RANGE_LENGTH`] slots.
    fn empty_slots(&self, min_slot: Slot, max_slot: Slot) -> Result<Vec<Slot>>;

    /// Returns the block with the given root followed by its ancestors, newest first.
    ///
    /// The walk stops at the first block whose parent is not stored.
    fn block_ancestors(&self, root: H256) -> Result<Vec<Block>>;
}

pub trait AttestationsProvider {
    /// Returns attestations that vote for the block with the given root.
    fn attestations_for_block(&self, block_root: H256) -> Result<Vec<Attestation>>;

    /// Returns attestations included in the block with the given root, ordered by position.
    fn attestations_in_block(&self, block_root: H256) -> Result<Vec<Attestation>>;

    /// Returns attestations with slots in `min_slot..=max_slot`.
    fn attestations_for_slot_range(&self, min_slot: Slot, max_slot: Slot)
        -> Result<Vec<Attestation>>;
}

pub trait ProposerSlashingsProvider {
    /// Returns proposer slashings whose headers have slots in `min_slot..=max_slot`.
    fn proposer_slashings_for_slot_range(
        &self,
        min_slot: Slot,
        max_slot: Slot,
    ) -> Result<Vec<ProposerSlashing>>;
}

pub trait VoluntaryExitsProvider {
    fn voluntary_exit(
        &self,
        validator_index: ValidatorIndex,
        epoch: Epoch,
    ) -> Result<Option<VoluntaryExit>>;
}

pub trait AttesterSlashingsProvider {
    fn attester_slashings_in_block(&self, block_root: H256) -> Result<Vec<AttesterSlashing>>;
}

pub trait ValidatorsProvider {
    /// Returns all validators in ascending order of index.
    fn validators(&self) -> Result<Vec<Validator>>;

    /// Validators that have no balance stored for `epoch` are omitted.
    fn validator_balances_by_validators_and_epoch(
        &self,
        validator_indices: &[ValidatorIndex],
        epoch: Epoch,
    ) -> Result<BTreeMap<ValidatorIndex, ValidatorBalance>>;
}

pub trait BeaconCommitteesProvider {
    /// Fails with [`Error::BeaconCommitteeNotFound`] if no such committee is stored.
    fn beacon_committee_by_slot_and_index(
        &self,
        slot: Slot,
        index: CommitteeIndex,
    ) -> Result<BeaconCommittee>;

    /// Derives attester duties from the committees stored for slots in `start_slot..=end_slot`.
    ///
    /// Duties are ordered by slot, committee index, and position in the committee.
    fn attester_duties(
        &self,
        start_slot: Slot,
        end_slot: Slot,
        validator_indices: &[ValidatorIndex],
    ) -> Result<Vec<AttesterDuty>>;
}

pub trait ProposerDutiesProvider {
    fn proposer_duties_for_slot_range(
        &self,
        min_slot: Slot,
        max_slot: Slot,
    ) -> Result<Vec<ProposerDuty>>;
}

pub trait MetadataProvider {
    fn metadata(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn metadata_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.metadata(key)?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(Into::into)
    }
}

impl<S: ReadStore + ?Sized> BlocksProvider for S {
    fn blocks_by_slot(&self, slot: Slot) -> Result<Vec<Block>> {
        self.read(|view| {
            store::indexed_values_in_range(
                view,
                keys::slot_range::<BlockRootBySlot>(slot, slot),
                |block: &Block| BlockRootBySlot(block.slot, block.root),
            )
        })
    }

    fn block_by_root(&self, root: H256) -> Result<Block> {
        self.read(|view| {
            store::get(view, BlockByRoot(root))?
                .ok_or_else(|| Error::BlockNotFound { block_root: root }.into())
        })
    }

    fn blocks_by_parent_root(&self, parent_root: H256) -> Result<Vec<Block>> {
        self.read(|view| {
            store::indexed_values_in_range(
                view,
                keys::prefix_range(format_args!(
                    "{}{parent_root:x}",
                    BlockRootByParentRoot::PREFIX,
                )),
                |block: &Block| BlockRootByParentRoot(block.parent_root, block.root),
            )
        })
    }

    fn empty_slots(&self, min_slot: Slot, max_slot: Slot) -> Result<Vec<Slot>> {
        if max_slot < min_slot {
            return Ok(vec![]);
        }

        ensure!(
            max_slot - min_slot < MAX_EMPTY_SLOTS_RANGE_LENGTH,
            Error::SlotRangeTooLong {
                min_slot,
                max_slot,
                limit: MAX_EMPTY_SLOTS_RANGE_LENGTH,
            },
        );

        let occupied = self.read(|view| {
            view
                .range_bytes(keys::slot_range::<BlockRootBySlot>(min_slot, max_slot))?
                .into_iter()
                .map(|(key, _)| BlockRootBySlot::slot_from_key(&key))
                .collect::<Result<BTreeSet<_>>>()
        })?;

        Ok((min_slot..=max_slot)
            .filter(|slot| !occupied.contains(slot))
            .collect())
    }

    fn block_ancestors(&self, root: H256) -> Result<Vec<Block>> {
        self.read(|view| {
            let mut block = store::get::<Block>(view, BlockByRoot(root))?
                .ok_or(Error::BlockNotFound { block_root: root })?;

            let mut ancestors = vec![];
            let mut visited = HashSet::from([root]);

            loop {
                let parent_root = block.parent_root;

                ancestors.push(block);

                if !visited.insert(parent_root) {
                    break;
                }

                match store::get(view, BlockByRoot(parent_root))? {
                    Some(parent) => block = parent,
                    None => break,
                }
            }

            Ok(ancestors)
        })
    }
}

impl<S: ReadStore + ?Sized> AttestationsProvider for S {
    fn attestations_for_block(&self, block_root: H256) -> Result<Vec<Attestation>> {
        self.read(|view| {
            store::indexed_values_in_range(
                view,
                keys::prefix_range(format_args!(
                    "{}{block_root:x}",
                    AttestationIdByBeaconBlockRoot::PREFIX,
                )),
                |attestation: &Attestation| {
                    AttestationIdByBeaconBlockRoot(
                        attestation.beacon_block_root,
                        attestation.inclusion_block_root,
                        attestation.inclusion_index,
                    )
                },
            )
        })
    }

    fn attestations_in_block(&self, block_root: H256) -> Result<Vec<Attestation>> {
        self.read(|view| {
            store::values_in_range(
                view,
                keys::prefix_range(format_args!("{}{block_root:x}", AttestationById::PREFIX)),
            )
        })
    }

    fn attestations_for_slot_range(
        &self,
        min_slot: Slot,
        max_slot: Slot,
    ) -> Result<Vec<Attestation>> {
        if max_slot < min_slot {
            return Ok(vec![]);
        }

        self.read(|view| {
            store::indexed_values_in_range(
                view,
                keys::slot_range::<AttestationIdBySlot>(min_slot, max_slot),
                |attestation: &Attestation| {
                    AttestationIdBySlot(
                        attestation.slot,
                        attestation.inclusion_block_root,
                        attestation.inclusion_index,
                    )
                },
            )
        })
    }
}

impl<S: ReadStore + ?Sized> ProposerSlashingsProvider for S {
    fn proposer_slashings_for_slot_range(
        &self,
        min_slot: Slot,
        max_slot: Slot,
    ) -> Result<Vec<ProposerSlashing>> {
        if max_slot < min_slot {
            return Ok(vec![]);
        }

        self.read(|view| {
            store::indexed_values_in_range(
                view,
                keys::slot_range::<ProposerSlashingIdBySlot>(min_slot, max_slot),
                |slashing: &ProposerSlashing| {
                    ProposerSlashingIdBySlot(
                        slashing.header_1.slot,
                        slashing.inclusion_block_root,
                        slashing.inclusion_index,
                    )
                },
            )
        })
    }
}

impl<S: ReadStore + ?Sized> VoluntaryExitsProvider for S {
    fn voluntary_exit(
        &self,
        validator_index: ValidatorIndex,
        epoch: Epoch,
    ) -> Result<Option<VoluntaryExit>> {
        self.read(|view| {
            store::get(view, VoluntaryExitByValidatorAndEpoch(validator_index, epoch))
        })
    }
}

impl<S: ReadStore + ?Sized> AttesterSlashingsProvider for S {
    fn attester_slashings_in_block(&self, block_root: H256) -> Result<Vec<AttesterSlashing>> {
        self.read(|view| {
            store::values_in_range(
                view,
                keys::prefix_range(format_args!(
                    "{}{block_root:x}",
                    AttesterSlashingById::PREFIX,
                )),
            )
        })
    }
}

impl<S: ReadStore + ?Sized> ValidatorsProvider for S {
    fn validators(&self) -> Result<Vec<Validator>> {
        self.read(|view| {
            store::values_in_range(view, keys::prefix_range(ValidatorByIndex::PREFIX))
        })
    }

    fn validator_balances_by_validators_and_epoch(
        &self,
        validator_indices: &[ValidatorIndex],
        epoch: Epoch,
    ) -> Result<BTreeMap<ValidatorIndex, ValidatorBalance>> {
        self.read(|view| {
            let mut balances = BTreeMap::<ValidatorIndex, ValidatorBalance>::new();

            for validator_index in validator_indices.iter().copied() {
                let key = ValidatorBalanceByIndexAndEpoch(validator_index, epoch);

                if let Some(balance) = store::get(view, key)? {
                    balances.insert(validator_index, balance);
                }
            }

            Ok(balances)
        })
    }
}

impl<S: ReadStore + ?Sized> BeaconCommitteesProvider for S {
    fn beacon_committee_by_slot_and_index(
        &self,
        slot: Slot,
        index: CommitteeIndex,
    ) -> Result<BeaconCommittee> {
        self.read(|view| {
            store::get(view, BeaconCommitteeBySlotAndIndex(slot, index))?
                .ok_or_else(|| Error::BeaconCommitteeNotFound { slot, index }.into())
        })
    }

    fn attester_duties(
        &self,
        start_slot: Slot,
        end_slot: Slot,
        validator_indices: &[ValidatorIndex],
    ) -> Result<Vec<AttesterDuty>> {
        if end_slot < start_slot || validator_indices.is_empty() {
            return Ok(vec![]);
        }

        let validator_indices = validator_indices.iter().collect::<HashSet<_>>();

        let committees = self.read(|view| {
            store::values_in_range::<BeaconCommittee>(
                view,
                keys::slot_range::<BeaconCommitteeBySlotAndIndex>(start_slot, end_slot),
            )
        })?;

        let duties = committees
            .iter()
            .flat_map(|committee| {
                let validator_indices = &validator_indices;

                committee
                    .committee
                    .iter()
                    .zip(0..)
                    .filter(move |(validator_index, _)| validator_indices.contains(validator_index))
                    .map(move |(validator_index, validator_committee_index)| AttesterDuty {
                        slot: committee.slot,
                        committee_index: committee.index,
                        validator_index: *validator_index,
                        validator_committee_index,
                    })
            })
            .collect();

        Ok(duties)
    }
}

impl<S: ReadStore + ?Sized> ProposerDutiesProvider for S {
    fn proposer_duties_for_slot_range(
        &self,
        min_slot: Slot,
        max_slot: Slot,
    ) -> Result<Vec<ProposerDuty>> {
        if max_slot < min_slot {
            return Ok(vec![]);
        }

        self.read(|view| {
            store::values_in_range(
                view,
                keys::slot_range::<ProposerDutyBySlot>(min_slot, max_slot),
            )
        })
    }
}

impl<S: ReadStore + ?Sized> MetadataProvider for S {
    fn metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read(|view| view.get_bytes(store::serialize_key(MetadataByKey(key)).as_bytes()))
    }
}
