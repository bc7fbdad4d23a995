//! `KeyRotator`: a round-robin cursor over a provider's immutable API key
//! list, mutated under a single critical section per spec §4.1.

use std::sync::Mutex;

pub struct KeyRotator {
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl KeyRotator {
    /// Panics if `keys` is empty: a provider with no keys is `DISABLED`
    /// and should never have a `KeyRotator` constructed for it.
    pub fn new(keys: Vec<String>) -> Self {
        assert!(!keys.is_empty(), "KeyRotator requires at least one key");
        KeyRotator {
            keys,
            cursor: Mutex::new(0),
        }
    }

    /// Returns the key at the current cursor position.
    pub fn current(&self) -> String {
        let idx = *self.cursor.lock().unwrap();
        self.keys[idx].clone()
    }

    /// Advances the cursor, wrapping modulo the key list length.
    pub fn advance(&self) {
        let mut idx = self.cursor.lock().unwrap();
        *idx = (*idx + 1) % self.keys.len();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
