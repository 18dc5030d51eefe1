use anyhow::{ensure, Result};
use serde::Serialize;
use types::containers::{
    Attestation, AttesterSlashing, BeaconCommittee, Block, ProposerDuty, ProposerSlashing,
    Validator, ValidatorBalance, VoluntaryExit,
};

use crate::{
    keys::{
        AttestationById, AttestationIdByBeaconBlockRoot, AttestationIdBySlot,
        AttesterSlashingById, BeaconCommitteeBySlotAndIndex, BlockByRoot, BlockRootByParentRoot,
        BlockRootBySlot, MetadataByKey, ProposerDutyBySlot, ProposerSlashingById,
        ProposerSlashingIdBySlot, ValidatorBalanceByIndexAndEpoch, ValidatorByIndex,
        VoluntaryExitByValidatorAndEpoch,
    },
    store::{self, WriteStore},
    Error,
};

// Every setter is an upsert. Calling one twice with the same value leaves the same stored state.

pub trait BlocksSetter {
    /// Fails with [`Error::BlockRootMismatch`] if `block.root` is not the root of its header.
    fn set_block(&mut self, block: &Block) -> Result<()>;
}

pub trait AttestationsSetter {
    fn set_attestation(&mut self, attestation: &Attestation) -> Result<()>;
}

pub trait VoluntaryExitsSetter {
    fn set_voluntary_exit(&mut self, voluntary_exit: &VoluntaryExit) -> Result<()>;
}

pub trait AttesterSlashingsSetter {
    fn set_attester_slashing(&mut self, attester_slashing: &AttesterSlashing) -> Result<()>;
}

pub trait ProposerSlashingsSetter {
    fn set_proposer_slashing(&mut self, proposer_slashing: &ProposerSlashing) -> Result<()>;
}

pub trait ValidatorsSetter {
    fn set_validator(&mut self, validator: &Validator) -> Result<()>;

    fn set_validator_balance(&mut self, validator_balance: &ValidatorBalance) -> Result<()>;
}

pub trait BeaconCommitteesSetter {
    /// Committees cannot be changed once committed.
    /// A conflicting committee makes [`Transaction::commit_tx`] fail.
    ///
    /// [`Transaction::commit_tx`]: crate::Transaction::commit_tx
    fn set_beacon_committee(&mut self, beacon_committee: &BeaconCommittee) -> Result<()>;
}

pub trait ProposerDutiesSetter {
    fn set_proposer_duty(&mut self, proposer_duty: &ProposerDuty) -> Result<()>;
}

pub trait MetadataSetter {
    /// Stores `value` as is.
    fn set_metadata(&mut self, key: &str, value: &[u8]) -> Result<()>;

    fn set_metadata_json(&mut self, key: &str, value: &impl Serialize) -> Result<()> {
        self.set_metadata(key, &serde_json::to_vec(value)?)
    }
}

impl<S: WriteStore + ?Sized> BlocksSetter for S {
    fn set_block(&mut self, block: &Block) -> Result<()> {
        let computed = block.header().hash_tree_root();

        ensure!(
            computed == block.root,
            Error::BlockRootMismatch {
                stored: block.root,
                computed,
            },
        );

        let primary_key = BlockByRoot(block.root);

        store::put(self, &primary_key, block)?;
        store::put_index(self, BlockRootBySlot(block.slot, block.root), &primary_key)?;
        store::put_index(
            self,
            BlockRootByParentRoot(block.parent_root, block.root),
            &primary_key,
        )
    }
}

impl<S: WriteStore + ?Sized> AttestationsSetter for S {
    fn set_attestation(&mut self, attestation: &Attestation) -> Result<()> {
        let Attestation {
            inclusion_block_root,
            inclusion_index,
            slot,
            beacon_block_root,
            ..
        } = *attestation;

        let primary_key = AttestationById(inclusion_block_root, inclusion_index);

        store::put(self, &primary_key, attestation)?;

        store::put_index(
            self,
            AttestationIdByBeaconBlockRoot(beacon_block_root, inclusion_block_root, inclusion_index),
            &primary_key,
        )?;

        store::put_index(
            self,
            AttestationIdBySlot(slot, inclusion_block_root, inclusion_index),
            &primary_key,
        )
    }
}

impl<S: WriteStore + ?Sized> VoluntaryExitsSetter for S {
    fn set_voluntary_exit(&mut self, voluntary_exit: &VoluntaryExit) -> Result<()> {
        let key =
            VoluntaryExitByValidatorAndEpoch(voluntary_exit.validator_index, voluntary_exit.epoch);

        store::put(self, key, voluntary_exit)
    }
}

impl<S: WriteStore + ?Sized> AttesterSlashingsSetter for S {
    fn set_attester_slashing(&mut self, attester_slashing: &AttesterSlashing) -> Result<()> {
        let key = AttesterSlashingById(
            attester_slashing.inclusion_block_root,
            attester_slashing.inclusion_index,
        );

        store::put(self, key, attester_slashing)
    }
}

impl<S: WriteStore + ?Sized> ProposerSlashingsSetter for S {
    fn set_proposer_slashing(&mut self, proposer_slashing: &ProposerSlashing) -> Result<()> {
        let ProposerSlashing {
            inclusion_block_root,
            inclusion_index,
            header_1,
            ..
        } = *proposer_slashing;

        let primary_key = ProposerSlashingById(inclusion_block_root, inclusion_index);

        store::put(self, &primary_key, proposer_slashing)?;

        store::put_index(
            self,
            ProposerSlashingIdBySlot(header_1.slot, inclusion_block_root, inclusion_index),
            &primary_key,
        )
    }
}

impl<S: WriteStore + ?Sized> ValidatorsSetter for S {
    fn set_validator(&mut self, validator: &Validator) -> Result<()> {
        store::put(self, ValidatorByIndex(validator.index), validator)
    }

    fn set_validator_balance(&mut self, validator_balance: &ValidatorBalance) -> Result<()> {
        let key = ValidatorBalanceByIndexAndEpoch(validator_balance.index, validator_balance.epoch);

        store::put(self, key, validator_balance)
    }
}

impl<S: WriteStore + ?Sized> BeaconCommitteesSetter for S {
    fn set_beacon_committee(&mut self, beacon_committee: &BeaconCommittee) -> Result<()> {
        let key = BeaconCommitteeBySlotAndIndex(beacon_committee.slot, beacon_committee.index);

        store::put(self, key, beacon_committee)
    }
}

impl<S: WriteStore + ?Sized> ProposerDutiesSetter for S {
    fn set_proposer_duty(&mut self, proposer_duty: &ProposerDuty) -> Result<()> {
        store::put(self, ProposerDutyBySlot(proposer_duty.slot), proposer_duty)
    }
}

impl<S: WriteStore + ?Sized> MetadataSetter for S {
    fn set_metadata(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.put_bytes(store::serialize_key(MetadataByKey(key)).as_bytes(), value)
    }
}
