//! Slot and epoch arithmetic for the Beacon Chain.
//!
//! [`ChainTime`] is a pure function of three constants: genesis time, slot duration, and the number
//! of slots in an epoch. Slot 0 starts at genesis. Times before genesis map to slot 0.
//!
//! [`ChainTime::slots`] is implemented using [`Interval`]. The API of [`Interval`] uses
//! [`Instant`]s, which are opaque. There is no way to directly convert a timestamp to an
//! [`Instant`], so the stream assumes that an [`Instant`] and a [`SystemTime`] obtained one after
//! the other correspond to the same point in time.
//!
//! [`Instant`]:  tokio::time::Instant
//! [`Interval`]: tokio::time::Interval

use core::{error::Error, num::NonZeroU64, time::Duration};
use std::time::{Instant, SystemTime, SystemTimeError};

use anyhow::Result;
use futures::stream::{Stream, StreamExt as _};
use thiserror::Error;
use tokio_stream::wrappers::IntervalStream;
use types::{
    config::Config,
    consts::GENESIS_SLOT,
    primitives::{Epoch, Slot, UnixSeconds},
};

#[cfg(test)]
mod fake_time;

// 9999-12-31T23:59:59Z. `SystemTime` can represent this on every platform.
const LATEST_REPRESENTABLE_TIME: UnixSeconds = 253_402_300_799;

pub trait InstantLike: Sized {
    fn checked_add(self, duration: Duration) -> Option<Self>;
}

pub trait SystemTimeLike: Copy {
    type Error: Error + Send + Sync + 'static;

    const UNIX_EPOCH: Self;

    fn duration_since(self, earlier: Self) -> Result<Duration, Self::Error>;
}

impl InstantLike for Instant {
    fn checked_add(self, duration: Duration) -> Option<Self> {
        Self::checked_add(&self, duration)
    }
}

impl SystemTimeLike for SystemTime {
    type Error = SystemTimeError;

    const UNIX_EPOCH: Self = Self::UNIX_EPOCH;

    fn duration_since(self, earlier: Self) -> Result<Duration, Self::Error> {
        Self::duration_since(&self, earlier)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChainTime {
    genesis_time: UnixSeconds,
    seconds_per_slot: NonZeroU64,
    slots_per_epoch: NonZeroU64,
}

impl ChainTime {
    #[must_use]
    pub const fn new(
        genesis_time: UnixSeconds,
        seconds_per_slot: NonZeroU64,
        slots_per_epoch: NonZeroU64,
    ) -> Self {
        Self {
            genesis_time,
            seconds_per_slot,
            slots_per_epoch,
        }
    }

    #[must_use]
    pub const fn from_config(config: &Config, genesis_time: UnixSeconds) -> Self {
        Self::new(genesis_time, config.seconds_per_slot, config.slots_per_epoch)
    }

    #[must_use]
    pub fn genesis_time(self) -> SystemTime {
        self.start_of_slot(GENESIS_SLOT)
    }

    #[must_use]
    pub const fn genesis_unix_time(self) -> UnixSeconds {
        self.genesis_time
    }

    #[must_use]
    pub const fn slot_duration(self) -> Duration {
        Duration::from_secs(self.seconds_per_slot.get())
    }

    /// Returns the start of `slot` in Unix seconds, saturating at [`UnixSeconds::MAX`].
    #[must_use]
    pub const fn unix_start_of_slot(self, slot: Slot) -> UnixSeconds {
        let since_genesis = (slot - GENESIS_SLOT).saturating_mul(self.seconds_per_slot.get());
        self.genesis_time.saturating_add(since_genesis)
    }

    /// Returns the start of `slot`.
    ///
    /// Consecutive slots start [`Self::slot_duration`] apart, except that times after the end
    /// of year 9999 are clamped to it. All slots past that point start at the same time.
    #[must_use]
    pub fn start_of_slot(self, slot: Slot) -> SystemTime {
        let unix_time = self.unix_start_of_slot(slot).min(LATEST_REPRESENTABLE_TIME);
        SystemTime::UNIX_EPOCH + Duration::from_secs(unix_time)
    }

    #[must_use]
    pub fn start_of_epoch(self, epoch: Epoch) -> SystemTime {
        self.start_of_slot(self.first_slot_of_epoch(epoch))
    }

    /// Returns the slot in progress according to the system clock.
    ///
    /// Returns [`GENESIS_SLOT`] before genesis.
    #[must_use]
    pub fn current_slot(self) -> Slot {
        self.slot_at(SystemTime::now())
    }

    #[must_use]
    pub fn current_epoch(self) -> Epoch {
        self.slot_to_epoch(self.current_slot())
    }

    #[must_use]
    pub const fn slot_to_epoch(self, slot: Slot) -> Epoch {
        slot / self.slots_per_epoch.get()
    }

    #[must_use]
    pub const fn first_slot_of_epoch(self, epoch: Epoch) -> Slot {
        epoch.saturating_mul(self.slots_per_epoch.get())
    }

    #[must_use]
    pub const fn is_epoch_start(self, slot: Slot) -> bool {
        slot % self.slots_per_epoch.get() == 0
    }

    /// Returns the slot in progress at `time`.
    ///
    /// Returns [`GENESIS_SLOT`] for times before genesis and times that cannot be expressed
    /// relative to the Unix epoch.
    #[must_use]
    pub fn slot_at<S: SystemTimeLike>(self, time: S) -> Slot {
        let Ok(unix_epoch_to_time) = time.duration_since(S::UNIX_EPOCH) else {
            return GENESIS_SLOT;
        };

        // Slots are a whole number of seconds long, so the fractional part can be ignored.
        let genesis_to_time = unix_epoch_to_time
            .as_secs()
            .saturating_sub(self.genesis_time);

        GENESIS_SLOT + genesis_to_time / self.seconds_per_slot.get()
    }

    /// Returns the next slot to start along with the time remaining until it does.
    ///
    /// If a slot starts exactly now, that slot is returned with a remaining time of zero.
    pub fn next_slot_with_remaining_time(self) -> Result<(Slot, Duration)> {
        // We assume the `Instant` and `SystemTime` obtained here correspond to the same point in time.
        let now_instant = Instant::now();
        let now_system_time = SystemTime::now();

        let (next_slot, next_instant) = self.next_slot_with_instant(now_instant, now_system_time)?;
        let remaining_time = next_instant.duration_since(now_instant);

        Ok((next_slot, remaining_time))
    }

    /// Returns a stream that yields every slot at the moment it starts.
    ///
    /// Before genesis, the first item is slot 0 at genesis.
    pub fn slots(self) -> Result<impl Stream<Item = Result<Slot>>> {
        let now_instant = Instant::now();
        let now_system_time = SystemTime::now();

        let (mut next_slot, next_instant) =
            self.next_slot_with_instant(now_instant, now_system_time)?;

        let interval = tokio::time::interval_at(next_instant.into(), self.slot_duration());

        Ok(IntervalStream::new(interval).map(move |_| {
            let current_slot = next_slot;
            next_slot = current_slot
                .checked_add(1)
                .ok_or(ChainTimeError::RanOutOfSlots)?;
            Ok(current_slot)
        }))
    }

    fn next_slot_with_instant<I: InstantLike, S: SystemTimeLike>(
        self,
        now_instant: I,
        now_system_time: S,
    ) -> Result<(Slot, I)> {
        let unix_epoch_to_now = now_system_time.duration_since(S::UNIX_EPOCH)?;
        let unix_epoch_to_genesis = Duration::from_secs(self.genesis_time);

        // Some platforms do not support `Instant`s before a platform dependent epoch.
        // The `InstantLike` trait prevents subtracting `Duration`s from `Instant`s.

        let (next_slot, now_to_next_slot) = if unix_epoch_to_now <= unix_epoch_to_genesis {
            (GENESIS_SLOT, unix_epoch_to_genesis - unix_epoch_to_now)
        } else {
            let genesis_to_now = unix_epoch_to_now - unix_epoch_to_genesis;
            let slots_since_genesis = genesis_to_now.as_secs() / self.seconds_per_slot.get();
            let genesis_to_current_slot =
                Duration::from_secs(slots_since_genesis * self.seconds_per_slot.get());
            let current_slot_to_now = genesis_to_now - genesis_to_current_slot;
            let current_slot = GENESIS_SLOT + slots_since_genesis;

            if current_slot_to_now.is_zero() {
                (current_slot, Duration::ZERO)
            } else {
                let next_slot = current_slot
                    .checked_add(1)
                    .ok_or(ChainTimeError::RanOutOfSlots)?;

                (next_slot, self.slot_duration() - current_slot_to_now)
            }
        };

        let next_instant = now_instant
            .checked_add(now_to_next_slot)
            .ok_or(ChainTimeError::NextInstantOverflow)?;

        Ok((next_slot, next_instant))
    }
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ChainTimeError {
    #[error("time of next slot overflowed")]
    NextInstantOverflow,
    #[error("ran out of slots")]
    RanOutOfSlots,
}
