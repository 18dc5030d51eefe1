use core::ops::Range;

use anyhow::Result;
use database::PrefixableKey;
use derive_more::Display;
use types::primitives::{CommitteeIndex, Epoch, Slot, ValidatorIndex, H256};

use crate::Error;

// Every field after the prefix is either zero-padded decimal or lowercase hex,
// so a byte above the ASCII range sorts after every continuation of a key.
const PAST_ASCII: u8 = 0xff;

#[derive(Display)]
#[display("{}{_0:x}", Self::PREFIX)]
pub struct BlockByRoot(pub H256);

impl PrefixableKey for BlockByRoot {
    const PREFIX: &'static str = "b";
}

#[derive(Display)]
#[display("{}{_0:020}{_1:x}", Self::PREFIX)]
pub struct BlockRootBySlot(pub Slot, pub H256);

impl BlockRootBySlot {
    pub fn slot_from_key(bytes: &[u8]) -> Result<Slot> {
        let payload = bytes
            .strip_prefix(Self::PREFIX.as_bytes())
            .and_then(|payload| payload.get(..20))
            .ok_or_else(|| Error::IncorrectPrefix {
                bytes: bytes.to_vec(),
            })?;

        let string = core::str::from_utf8(payload)?;
        let slot = string.parse()?;

        Ok(slot)
    }
}

impl PrefixableKey for BlockRootBySlot {
    const PREFIX: &'static str = "r";
}

#[derive(Display)]
#[display("{}{_0:x}{_1:x}", Self::PREFIX)]
pub struct BlockRootByParentRoot(pub H256, pub H256);

impl PrefixableKey for BlockRootByParentRoot {
    const PREFIX: &'static str = "p";
}

/// Attestations are identified by the block they were included in and their position in it.
#[derive(Display)]
#[display("{}{_0:x}{_1:020}", Self::PREFIX)]
pub struct AttestationById(pub H256, pub u64);

impl PrefixableKey for AttestationById {
    const PREFIX: &'static str = "a";
}

#[derive(Display)]
#[display("{}{_0:x}{_1:x}{_2:020}", Self::PREFIX)]
pub struct AttestationIdByBeaconBlockRoot(pub H256, pub H256, pub u64);

impl PrefixableKey for AttestationIdByBeaconBlockRoot {
    const PREFIX: &'static str = "f";
}

#[derive(Display)]
#[display("{}{_0:020}{_1:x}{_2:020}", Self::PREFIX)]
pub struct AttestationIdBySlot(pub Slot, pub H256, pub u64);

impl PrefixableKey for AttestationIdBySlot {
    const PREFIX: &'static str = "q";
}

#[derive(Display)]
#[display("{}{_0:020}{_1:020}", Self::PREFIX)]
pub struct VoluntaryExitByValidatorAndEpoch(pub ValidatorIndex, pub Epoch);

impl PrefixableKey for VoluntaryExitByValidatorAndEpoch {
    const PREFIX: &'static str = "x";
}

#[derive(Display)]
#[display("{}{_0:x}{_1:020}", Self::PREFIX)]
pub struct AttesterSlashingById(pub H256, pub u64);

impl PrefixableKey for AttesterSlashingById {
    const PREFIX: &'static str = "h";
}

#[derive(Display)]
#[display("{}{_0:x}{_1:020}", Self::PREFIX)]
pub struct ProposerSlashingById(pub H256, pub u64);

impl PrefixableKey for ProposerSlashingById {
    const PREFIX: &'static str = "k";
}

#[derive(Display)]
#[display("{}{_0:020}{_1:x}{_2:020}", Self::PREFIX)]
pub struct ProposerSlashingIdBySlot(pub Slot, pub H256, pub u64);

impl PrefixableKey for ProposerSlashingIdBySlot {
    const PREFIX: &'static str = "j";
}

#[derive(Display)]
#[display("{}{_0:020}", Self::PREFIX)]
pub struct ValidatorByIndex(pub ValidatorIndex);

impl PrefixableKey for ValidatorByIndex {
    const PREFIX: &'static str = "v";
}

#[derive(Display)]
#[display("{}{_0:020}{_1:020}", Self::PREFIX)]
pub struct ValidatorBalanceByIndexAndEpoch(pub ValidatorIndex, pub Epoch);

impl PrefixableKey for ValidatorBalanceByIndexAndEpoch {
    const PREFIX: &'static str = "w";
}

#[derive(Display)]
#[display("{}{_0:020}{_1:020}", Self::PREFIX)]
pub struct BeaconCommitteeBySlotAndIndex(pub Slot, pub CommitteeIndex);

impl PrefixableKey for BeaconCommitteeBySlotAndIndex {
    const PREFIX: &'static str = "m";
}

#[derive(Display)]
#[display("{}{_0:020}", Self::PREFIX)]
pub struct ProposerDutyBySlot(pub Slot);

impl PrefixableKey for ProposerDutyBySlot {
    const PREFIX: &'static str = "d";
}

/// Metadata keys are arbitrary strings, so they can never be used as range bounds.
#[derive(Display)]
#[display("{}{_0}", Self::PREFIX)]
pub struct MetadataByKey<'key>(pub &'key str);

impl PrefixableKey for MetadataByKey<'_> {
    const PREFIX: &'static str = "z";
}

/// Returns the range of all keys that start with `prefix`.
pub fn prefix_range(prefix: impl core::fmt::Display) -> Range<Vec<u8>> {
    let start = prefix.to_string().into_bytes();
    let mut end = start.clone();
    end.push(PAST_ASCII);
    start..end
}

/// Returns the range of all keys that start with `K::PREFIX` followed by a zero-padded slot in
/// `min_slot..=max_slot`.
pub fn slot_range<K: PrefixableKey>(min_slot: Slot, max_slot: Slot) -> Range<Vec<u8>> {
    let start = format!("{}{min_slot:020}", K::PREFIX).into_bytes();
    let mut end = format!("{}{max_slot:020}", K::PREFIX).into_bytes();
    end.push(PAST_ASCII);
    start..end
}
