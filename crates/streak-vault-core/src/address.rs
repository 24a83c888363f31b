//! Derived addresses.
//!
//! Every protocol record lives at an address computed from
//! (namespace, owner, deck id). Any address can be recomputed by anyone
//! holding those three values, so no secondary index is needed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Identity;
use crate::types::DeckId;

/// Domain separation prefix for derived addresses.
const ADDRESS_DOMAIN: &[u8] = b"streak-vault-address-v1:";

/// The namespace a derived address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Vault entries (escrow records).
    Vault,
    /// Capability tokens.
    Capability,
    /// Issued credentials.
    Credential,
}

impl Namespace {
    /// The seed tag hashed into addresses of this namespace.
    pub const fn tag(&self) -> &'static [u8] {
        match self {
            Namespace::Vault => b"vault",
            Namespace::Capability => b"capability",
            Namespace::Credential => b"credential",
        }
    }
}

/// A 32-byte ledger address.
///
/// Wallet addresses are identity bytes; record addresses are derived with
/// [`Address::derive`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Derive the address of a record.
    ///
    /// Every variable-length component is length-prefixed, so distinct
    /// (namespace, owner, deck id) triples never share an encoding.
    pub fn derive(namespace: Namespace, owner: &Identity, deck_id: &DeckId) -> Self {
        let tag = namespace.tag();
        let mut hasher = blake3::Hasher::new();
        hasher.update(ADDRESS_DOMAIN);
        hasher.update(&[tag.len() as u8]);
        hasher.update(tag);
        hasher.update(owner.as_bytes());
        hasher.update(&[deck_id.as_bytes().len() as u8]);
        hasher.update(deck_id.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Address of the vault entry for (owner, deck).
    pub fn vault(owner: &Identity, deck_id: &DeckId) -> Self {
        Self::derive(Namespace::Vault, owner, deck_id)
    }

    /// Address of the capability token for (owner, deck).
    pub fn capability(owner: &Identity, deck_id: &DeckId) -> Self {
        Self::derive(Namespace::Capability, owner, deck_id)
    }

    /// Address of the credential for (owner, deck).
    pub fn credential(owner: &Identity, deck_id: &DeckId) -> Self {
        Self::derive(Namespace::Credential, owner, deck_id)
    }

    /// The wallet address of an identity.
    pub const fn wallet(identity: &Identity) -> Self {
        Self(identity.0)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<Identity> for Address {
    fn from(identity: Identity) -> Self {
        Self::wallet(&identity)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
