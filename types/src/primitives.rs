use core::fmt::{Debug, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use serde_with::{As, Bytes};

pub use ethereum_types::H256;

pub type CommitteeIndex = u64;
pub type Epoch = u64;
pub type Gwei = u64;
pub type Slot = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;

pub const PUBLIC_KEY_SIZE: usize = 48;

/// Compressed BLS public key.
///
/// Stored as raw bytes. Nothing in the chain database needs to decompress it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKeyBytes(#[serde(with = "As::<Bytes>")] pub [u8; PUBLIC_KEY_SIZE]);

impl Default for PublicKeyBytes {
    fn default() -> Self {
        Self([0; PUBLIC_KEY_SIZE])
    }
}

impl AsRef<[u8; PUBLIC_KEY_SIZE]> for PublicKeyBytes {
    fn as_ref(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }
}

impl Debug for PublicKeyBytes {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        formatter.write_str("0x")?;

        for byte in self.0 {
            write!(formatter, "{byte:02x}")?;
        }

        Ok(())
    }
}
