//! Keyring to perform rPGP operations with.

use crate::key::DcKey;

/// An in-memory keyring.
///
/// Instances are usually constructed just for one rPGP operation and
/// short-lived. Ordering is significant only for decryption, where the
/// first successfully decrypting key wins.
#[derive(Clone, Debug, Default)]
pub struct Keyring<T>
where
    T: DcKey,
{
    keys: Vec<T>,
}

impl<T> Keyring<T>
where
    T: DcKey,
{
    /// New empty keyring.
    pub fn new() -> Keyring<T> {
        Keyring { keys: Vec::new() }
    }

    /// Add a key to the keyring.
    pub fn add(&mut self, key: T) {
        self.keys.push(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// A slice of all the keys in the keyring.
    pub fn keys(&self) -> &[T] {
        &self.keys
    }
}
