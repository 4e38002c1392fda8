use edr_primitives::{Address, HashMap, U256};

use crate::StateError;

/// Size of a storage key or value in bytes.
pub const STORAGE_WORD_SIZE: usize = 32;

/// Parses a storage value, which must be exactly 32 bytes long.
pub fn storage_value_from_bytes(bytes: &[u8]) -> Result<U256, StateError> {
    if bytes.len() != STORAGE_WORD_SIZE {
        return Err(StateError::InvalidStorageValueLength(bytes.len()));
    }

    Ok(U256::from_be_slice(bytes))
}

/// Records the first observed value of storage slots.
#[derive(Clone, Debug, Default)]
pub struct OriginalStorageCache {
    slots: HashMap<(Address, U256), U256>,
}

impl OriginalStorageCache {
    /// Returns the cached value of the slot, populating it with the value
    /// produced by `load` on first access.
    pub fn get_or_load(
        &mut self,
        address: Address,
        index: U256,
        load: impl FnOnce() -> Result<U256, StateError>,
    ) -> Result<U256, StateError> {
        if let Some(value) = self.slots.get(&(address, index)) {
            return Ok(*value);
        }

        let value = load()?;
        self.slots.insert((address, index), value);
        Ok(value)
    }

    /// Forgets all cached values.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
