//! Opaque random identifiers.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters identifiers are drawn from. Look-alikes (`0`, `O`, `I`, `l`)
/// are left out so IDs survive being read aloud or retyped.
pub const ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of account identifiers.
pub const ACCOUNT_ID_LEN: usize = 8;
/// Length of room identifiers.
pub const ROOM_ID_LEN: usize = 22;
/// Length of message identifiers.
pub const MESSAGE_ID_LEN: usize = 22;

/// Returns `len` characters drawn uniformly from [`ALPHABET`].
///
/// Uses the thread-local CSPRNG, so outputs are unpredictable and two
/// calls (on any threads) share no observable state.
pub fn random_string(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// An opaque string identifier for accounts, rooms and messages.
///
/// `#[serde(transparent)]` keeps it a bare JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier of `len` characters.
    pub fn generate(len: usize) -> Self {
        Self(random_string(len))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
