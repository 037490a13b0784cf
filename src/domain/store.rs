//! The single mutable value behind the demo characteristic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Error;

/// Bytes a stored value occupies on the wire (little-endian `u32`).
pub const VALUE_LEN: usize = 4;

/// Shared handle to the one [`ValueStore`] of the process.
pub type SharedValueStore = Arc<ValueStore>;

/// Holds the last written 32-bit value.
///
/// Every characteristic referencing this store sees every write, no matter
/// which characteristic instance performed it. Reads return the wrapping
/// square of the stored value, not the value itself.
#[derive(Debug, Default)]
pub struct ValueStore {
    value: Mutex<u32>,
}

impl ValueStore {
    /// A fresh store holding 0.
    pub fn new() -> SharedValueStore {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        // A poisoned lock only means some holder panicked; the u32 inside
        // is still a valid value.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored value from a 4-byte little-endian buffer.
    ///
    /// Any other length fails with [`Error::MalformedValue`] and leaves the
    /// stored value untouched.
    pub fn write(&self, payload: &[u8]) -> Result<(), Error> {
        let bytes: [u8; VALUE_LEN] = payload.try_into().map_err(|_| Error::MalformedValue {
            expected: VALUE_LEN,
            actual: payload.len(),
        })?;
        *self.lock() = u32::from_le_bytes(bytes);
        Ok(())
    }

    /// The squared stored value, little-endian.
    ///
    /// Squaring wraps modulo 2^32 rather than failing, matching the
    /// fixed-width wire format.
    pub fn read(&self) -> [u8; VALUE_LEN] {
        let value = *self.lock();
        value.wrapping_mul(value).to_le_bytes()
    }

    /// The raw stored value, without the read transform.
    pub fn value(&self) -> u32 {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let store = ValueStore::new();
        assert_eq!(store.value(), 0);
        assert_eq!(store.read(), [0, 0, 0, 0]);
    }

    #[test]
    fn read_returns_square_of_written_value() {
        let store = ValueStore::new();
        store.write(&5u32.to_le_bytes()).unwrap();
        assert_eq!(store.read(), 25u32.to_le_bytes());
        assert_eq!(store.value(), 5);
    }

    #[test]
    fn square_wraps_at_u32_max() {
        let store = ValueStore::new();
        store.write(&0xFFFF_FFFFu32.to_le_bytes()).unwrap();
        // 4294967295^2 mod 2^32 == 1
        assert_eq!(store.read(), 1u32.to_le_bytes());
    }

    #[test]
    fn short_write_is_rejected_and_value_unchanged() {
        let store = ValueStore::new();
        store.write(&7u32.to_le_bytes()).unwrap();

        let err = store.write(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedValue {
                expected: 4,
                actual: 3
            }
        ));
        assert_eq!(store.value(), 7);
    }

    #[test]
    fn long_write_is_rejected() {
        let store = ValueStore::new();
        let err = store.write(&[0; 5]).unwrap_err();
        assert!(matches!(err, Error::MalformedValue { actual: 5, .. }));
        assert_eq!(store.value(), 0);
    }

    #[test]
    fn writes_are_visible_through_every_handle() {
        let store = ValueStore::new();
        let other = Arc::clone(&store);
        other.write(&3u32.to_le_bytes()).unwrap();
        assert_eq!(store.read(), 9u32.to_le_bytes());
    }
}
