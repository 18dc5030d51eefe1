use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::primitives::{
    CommitteeIndex, Epoch, Gwei, PublicKeyBytes, Slot, ValidatorIndex, H256,
};

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct BlockHeader {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
}

/// A beacon block as stored in the chain database.
///
/// `root` is the root of the header formed by the first five fields.
/// Use [`Block::new`] to compute it.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Block {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,
    pub parent_root: H256,
    pub state_root: H256,
    pub body_root: H256,
    pub root: H256,
    pub graffiti: H256,
    pub eth1_block_hash: H256,
    pub eth1_deposit_count: u64,
    pub eth1_deposit_root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Attestation {
    pub inclusion_slot: Slot,
    pub inclusion_block_root: H256,
    pub inclusion_index: u64,
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub aggregation_bits: Vec<u8>,
    pub beacon_block_root: H256,
    pub source_epoch: Epoch,
    pub source_root: H256,
    pub target_epoch: Epoch,
    pub target_root: H256,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct VoluntaryExit {
    pub inclusion_slot: Slot,
    pub inclusion_block_root: H256,
    pub inclusion_index: u64,
    pub validator_index: ValidatorIndex,
    pub epoch: Epoch,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct IndexedAttestationData {
    pub attesting_indices: Vec<ValidatorIndex>,
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub beacon_block_root: H256,
    pub source_epoch: Epoch,
    pub source_root: H256,
    pub target_epoch: Epoch,
    pub target_root: H256,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct AttesterSlashing {
    pub inclusion_slot: Slot,
    pub inclusion_block_root: H256,
    pub inclusion_index: u64,
    pub attestation_1: IndexedAttestationData,
    pub attestation_2: IndexedAttestationData,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct ProposerSlashing {
    pub inclusion_slot: Slot,
    pub inclusion_block_root: H256,
    pub inclusion_index: u64,
    pub header_1: BlockHeader,
    pub header_2: BlockHeader,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Validator {
    pub index: ValidatorIndex,
    pub public_key: PublicKeyBytes,
    pub effective_balance: Gwei,
    pub slashed: bool,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct ValidatorBalance {
    pub index: ValidatorIndex,
    pub epoch: Epoch,
    pub balance: Gwei,
    pub effective_balance: Gwei,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct BeaconCommittee {
    pub slot: Slot,
    pub index: CommitteeIndex,
    pub committee: Vec<ValidatorIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct AttesterDuty {
    pub slot: Slot,
    pub committee_index: CommitteeIndex,
    pub validator_index: ValidatorIndex,
    /// Position of the validator in the committee.
    pub validator_committee_index: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct ProposerDuty {
    pub slot: Slot,
    pub validator_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
pub enum ValidatorStatus {
    #[display("pending")]
    Pending,
    #[display("active")]
    Active,
    #[display("active_slashed")]
    ActiveSlashed,
    #[display("exited")]
    Exited,
    #[display("exited_slashed")]
    ExitedSlashed,
    #[display("withdrawable")]
    Withdrawable,
}
