use crate::primitives::{Epoch, Slot, UnixSeconds};

pub const FAR_FUTURE_EPOCH: Epoch = Epoch::MAX;
pub const GENESIS_SLOT: Slot = 0;

/// Genesis time of Ethereum Mainnet (2020-12-01 12:00:23 UTC).
pub const MAINNET_GENESIS_TIME: UnixSeconds = 1_606_824_023;
