use core::num::NonZeroU64;
use std::borrow::Cow;

use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};
use serde_with::{As, DisplayFromStr, PickFirst, Same};

use crate::primitives::UnixSeconds;

/// Chain parameters that determine the slot schedule.
///
/// Field names follow [configurations in `consensus-specs`]. Unknown fields are ignored,
/// so a full standard configuration file can be deserialized into this.
/// Numbers may be given either natively or as strings.
///
/// `SLOTS_PER_EPOCH` is a preset value in `consensus-specs`.
/// It is included here because it is needed to convert slots to epochs at runtime.
///
/// [configurations in `consensus-specs`]: https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/configs
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants. It is intended to be deserialized from user input. \
              The `unsafe` block in `nonzero!` only operates on the literal passed to it."
)]
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Genesis
    #[serde(with = "As::<PickFirst<(Same, DisplayFromStr)>>")]
    pub genesis_delay: u64,
    #[serde(with = "As::<PickFirst<(Same, DisplayFromStr)>>")]
    pub min_genesis_time: UnixSeconds,

    // Time parameters
    #[serde(with = "As::<PickFirst<(Same, DisplayFromStr)>>")]
    pub seconds_per_slot: NonZeroU64,
    #[serde(with = "As::<PickFirst<(Same, DisplayFromStr)>>")]
    pub slots_per_epoch: NonZeroU64,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub const fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),
            genesis_delay: 604_800,
            min_genesis_time: 1_606_824_000,
            seconds_per_slot: nonzero!(12_u64),
            slots_per_epoch: nonzero!(32_u64),
        }
    }

    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            config_name: Cow::Borrowed("minimal"),
            genesis_delay: 300,
            min_genesis_time: 1_578_009_600,
            seconds_per_slot: nonzero!(6_u64),
            slots_per_epoch: nonzero!(8_u64),
        }
    }
}
