//! Strong type definitions for Streak Vault.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Unix time in seconds, as reported by the host clock.
pub type Timestamp = i64;

/// Smallest indivisible unit of ledger balance.
pub type Lamports = u64;

/// Maximum length of a deck identifier, in bytes.
pub const MAX_DECK_ID_LENGTH: usize = 32;

/// A validated deck identifier: 1 to [`MAX_DECK_ID_LENGTH`] bytes of UTF-8.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeckId(String);

impl DeckId {
    /// Validate and wrap a deck identifier.
    pub fn new(deck_id: impl Into<String>) -> Result<Self, ProtocolError> {
        let deck_id = deck_id.into();
        if deck_id.is_empty() || deck_id.len() > MAX_DECK_ID_LENGTH {
            return Err(ProtocolError::InvalidDeckId);
        }
        Ok(Self(deck_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for DeckId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeckId> for String {
    fn from(deck_id: DeckId) -> Self {
        deck_id.0
    }
}

impl fmt::Debug for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeckId({:?})", self.0)
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeckId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
