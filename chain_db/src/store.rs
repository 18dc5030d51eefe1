use core::{fmt::Display, ops::Range};

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Byte-level reads from a single consistent state.
pub trait StoreView {
    fn get_bytes(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns all pairs with keys in `range` in ascending order.
    fn range_bytes(&self, range: Range<Vec<u8>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Read access to committed data or to the view of an open transaction.
pub trait ReadStore {
    /// Runs `read` against one [`StoreView`].
    ///
    /// All reads made through the view see the same state, even if other transactions commit
    /// in the meantime.
    fn read<T>(&self, read: impl FnOnce(&dyn StoreView) -> Result<T>) -> Result<T>;
}

pub trait WriteStore: ReadStore {
    fn put_bytes(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

pub fn get<V: DeserializeOwned>(
    store: &(impl StoreView + ?Sized),
    key: impl Display,
) -> Result<Option<V>> {
    store
        .get_bytes(serialize_key(key).as_bytes())?
        .map(|bytes| deserialize_value(&bytes))
        .transpose()
}

pub fn values_in_range<V: DeserializeOwned>(
    store: &(impl StoreView + ?Sized),
    range: Range<Vec<u8>>,
) -> Result<Vec<V>> {
    store
        .range_bytes(range)?
        .into_iter()
        .map(|(_, bytes)| deserialize_value(&bytes))
        .collect()
}

/// Follows index entries in `range` to the records they point to.
///
/// Index entries are never removed. An upsert that changes an indexed field leaves the old entry
/// in place, so only entries whose key equals `index_key` of the current record are followed.
pub fn indexed_values_in_range<V: DeserializeOwned, K: Display>(
    store: &(impl StoreView + ?Sized),
    range: Range<Vec<u8>>,
    index_key: impl Fn(&V) -> K,
) -> Result<Vec<V>> {
    let mut values = vec![];

    for (key, primary_key) in store.range_bytes(range)? {
        let Some(bytes) = store.get_bytes(&primary_key)? else {
            continue;
        };

        let value = deserialize_value(&bytes)?;

        if serialize_key(index_key(&value)).as_bytes() == key.as_slice() {
            values.push(value);
        }
    }

    Ok(values)
}

pub fn put(
    store: &mut (impl WriteStore + ?Sized),
    key: impl Display,
    value: &impl Serialize,
) -> Result<()> {
    store.put_bytes(serialize_key(key).as_bytes(), &serialize_value(value)?)
}

/// Stores an index entry pointing at the record stored under `primary_key`.
pub fn put_index(
    store: &mut (impl WriteStore + ?Sized),
    key: impl Display,
    primary_key: impl Display,
) -> Result<()> {
    store.put_bytes(
        serialize_key(key).as_bytes(),
        serialize_key(primary_key).as_bytes(),
    )
}

pub fn serialize_key(key: impl Display) -> String {
    key.to_string()
}

pub fn serialize_value(value: &impl Serialize) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(Into::into)
}

pub fn deserialize_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(Into::into)
}
