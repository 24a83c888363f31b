//! Ledger records: vault entries, capability tokens, and credentials.
//!
//! Each record type carries an 8-byte discriminator so that every record of
//! one kind can be enumerated from the ledger without a secondary index.

use ciborium::value::Value;

use crate::address::Address;
use crate::canonical::{decode_record, encode_record, int_map, MapReader, DISCRIMINATOR_LEN};
use crate::crypto::Identity;
use crate::error::{CoreError, ProtocolError};
use crate::types::{DeckId, Lamports, Timestamp};

/// Domain prefix hashed into record discriminators.
const DISCRIMINATOR_DOMAIN: &[u8] = b"streak-vault:record:";

/// The type of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    VaultEntry,
    CapabilityToken,
    Credential,
}

impl RecordKind {
    /// Every record kind.
    pub const ALL: [RecordKind; 3] = [
        RecordKind::VaultEntry,
        RecordKind::CapabilityToken,
        RecordKind::Credential,
    ];

    /// Type name hashed into the discriminator.
    pub const fn name(self) -> &'static str {
        match self {
            RecordKind::VaultEntry => "VaultEntry",
            RecordKind::CapabilityToken => "CapabilityToken",
            RecordKind::Credential => "Credential",
        }
    }

    /// First 8 bytes of `blake3("streak-vault:record:" || name)`.
    pub fn discriminator(self) -> [u8; DISCRIMINATOR_LEN] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DISCRIMINATOR_DOMAIN);
        hasher.update(self.name().as_bytes());
        let hash = hasher.finalize();

        let mut out = [0u8; DISCRIMINATOR_LEN];
        out.copy_from_slice(&hash.as_bytes()[..DISCRIMINATOR_LEN]);
        out
    }

    /// Identify the kind of an encoded record from its leading bytes.
    pub fn from_discriminator(bytes: &[u8]) -> Option<Self> {
        let tag = bytes.get(..DISCRIMINATOR_LEN)?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.discriminator().as_slice() == tag)
    }
}

/// A typed ledger record.
pub trait Record: Sized {
    /// The kind tag written in front of every encoding.
    const KIND: RecordKind;

    /// The derived address this record lives at.
    fn address(&self) -> Address;

    /// Build the CBOR body (without discriminator).
    fn to_value(&self) -> Value;

    /// Parse a CBOR body.
    fn from_value(value: &Value) -> Result<Self, CoreError>;

    /// Encode as `discriminator || canonical body`.
    fn encode(&self) -> Result<Vec<u8>, CoreError> {
        encode_record(Self::KIND, &self.to_value())
    }

    /// Decode, rejecting foreign discriminators and non-canonical bodies.
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let value = decode_record(Self::KIND, bytes)?;
        Self::from_value(&value)
    }
}

fn read_deck_id(reader: &MapReader<'_>, key: u64) -> Result<DeckId, CoreError> {
    DeckId::new(reader.text(key)?)
        .map_err(|_| CoreError::MalformedRecord(format!("field {} is not a deck id", key)))
}

fn identity_value(identity: &Identity) -> Value {
    Value::Bytes(identity.as_bytes().to_vec())
}

/// An open escrow tracking a streak-gated deposit for one (owner, deck).
///
/// Field keys: 0 owner, 1 deck_id, 2 deposit_amount, 3 start_time,
/// 4 last_check_in_time, 5 streak_target, 6 streak_counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultEntry {
    pub owner: Identity,
    pub deck_id: DeckId,
    pub deposit_amount: Lamports,
    pub start_time: Timestamp,
    pub last_check_in_time: Timestamp,
    pub streak_target: u32,
    pub streak_counter: u32,
}

impl VaultEntry {
    /// A freshly opened entry. The opening counts as the first check-in.
    pub fn new(
        owner: Identity,
        deck_id: DeckId,
        deposit_amount: Lamports,
        streak_target: u32,
        now: Timestamp,
    ) -> Self {
        Self {
            owner,
            deck_id,
            deposit_amount,
            start_time: now,
            last_check_in_time: now,
            streak_target,
            streak_counter: 1,
        }
    }

    /// Whether the streak has reached its target.
    pub fn target_met(&self) -> bool {
        self.streak_counter >= self.streak_target
    }
}

impl Record for VaultEntry {
    const KIND: RecordKind = RecordKind::VaultEntry;

    fn address(&self) -> Address {
        Address::vault(&self.owner, &self.deck_id)
    }

    fn to_value(&self) -> Value {
        int_map(vec![
            (0, identity_value(&self.owner)),
            (1, Value::Text(self.deck_id.as_str().to_owned())),
            (2, Value::Integer(self.deposit_amount.into())),
            (3, Value::Integer(self.start_time.into())),
            (4, Value::Integer(self.last_check_in_time.into())),
            (5, Value::Integer(self.streak_target.into())),
            (6, Value::Integer(self.streak_counter.into())),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, CoreError> {
        let r = MapReader::new(value)?;
        Ok(Self {
            owner: r.identity(0)?,
            deck_id: read_deck_id(&r, 1)?,
            deposit_amount: r.u64(2)?,
            start_time: r.i64(3)?,
            last_check_in_time: r.i64(4)?,
            streak_target: r.u32(5)?,
            streak_counter: r.u32(6)?,
        })
    }
}

/// Lifecycle state of a capability token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    /// Created, not yet eligible for issuance.
    Initialized,
    /// Eligible for issuance.
    Activated { activated_at: Timestamp },
    /// Spent. A consumed token's record no longer exists on the ledger.
    Consumed,
}

impl CapabilityState {
    fn tag(&self) -> u64 {
        match self {
            CapabilityState::Initialized => 0,
            CapabilityState::Activated { .. } => 1,
            CapabilityState::Consumed => 2,
        }
    }
}

/// One-time permission gating credential issuance for one (owner, deck).
///
/// Field keys: 0 owner, 1 deck_id, 2 created_at, 3 state tag,
/// 4 activated_at (null unless activated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    pub owner: Identity,
    pub deck_id: DeckId,
    pub created_at: Timestamp,
    pub state: CapabilityState,
}

impl CapabilityToken {
    pub fn new(owner: Identity, deck_id: DeckId, now: Timestamp) -> Self {
        Self {
            owner,
            deck_id,
            created_at: now,
            state: CapabilityState::Initialized,
        }
    }

    pub fn is_activated(&self) -> bool {
        matches!(self.state, CapabilityState::Activated { .. })
    }

    /// Activate the token. Returns `false` if it was already activated, in
    /// which case the original activation time is kept.
    pub fn activate(&mut self, now: Timestamp) -> bool {
        match self.state {
            CapabilityState::Initialized => {
                self.state = CapabilityState::Activated { activated_at: now };
                true
            }
            CapabilityState::Activated { .. } | CapabilityState::Consumed => false,
        }
    }

    /// Spend the token, producing the credential it gates.
    pub fn consume(self, now: Timestamp) -> Result<Credential, ProtocolError> {
        if !self.is_activated() {
            return Err(ProtocolError::NotActivated);
        }
        Ok(Credential {
            owner: self.owner,
            deck_id: self.deck_id,
            issued_at: now,
        })
    }
}

impl Record for CapabilityToken {
    const KIND: RecordKind = RecordKind::CapabilityToken;

    fn address(&self) -> Address {
        Address::capability(&self.owner, &self.deck_id)
    }

    fn to_value(&self) -> Value {
        let activated_at = match self.state {
            CapabilityState::Activated { activated_at } => Value::Integer(activated_at.into()),
            _ => Value::Null,
        };
        int_map(vec![
            (0, identity_value(&self.owner)),
            (1, Value::Text(self.deck_id.as_str().to_owned())),
            (2, Value::Integer(self.created_at.into())),
            (3, Value::Integer(self.state.tag().into())),
            (4, activated_at),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, CoreError> {
        let r = MapReader::new(value)?;
        let state = match r.u64(3)? {
            0 => CapabilityState::Initialized,
            1 => CapabilityState::Activated {
                activated_at: r.i64(4)?,
            },
            2 => CapabilityState::Consumed,
            other => {
                return Err(CoreError::MalformedRecord(format!(
                    "unknown capability state {}",
                    other
                )))
            }
        };
        Ok(Self {
            owner: r.identity(0)?,
            deck_id: read_deck_id(&r, 1)?,
            created_at: r.i64(2)?,
            state,
        })
    }
}

/// Terminal, immutable proof that a streak was completed.
///
/// Field keys: 0 owner, 1 deck_id, 2 issued_at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub owner: Identity,
    pub deck_id: DeckId,
    pub issued_at: Timestamp,
}

impl Record for Credential {
    const KIND: RecordKind = RecordKind::Credential;

    fn address(&self) -> Address {
        Address::credential(&self.owner, &self.deck_id)
    }

    fn to_value(&self) -> Value {
        int_map(vec![
            (0, identity_value(&self.owner)),
            (1, Value::Text(self.deck_id.as_str().to_owned())),
            (2, Value::Integer(self.issued_at.into())),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, CoreError> {
        let r = MapReader::new(value)?;
        Ok(Self {
            owner: r.identity(0)?,
            deck_id: read_deck_id(&r, 1)?,
            issued_at: r.i64(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn owner() -> Identity {
        Keypair::from_seed(&[9; 32]).identity()
    }

    fn deck() -> DeckId {
        DeckId::new("hiragana").unwrap()
    }

    #[test]
    fn test_discriminators_distinct() {
        let a = RecordKind::VaultEntry.discriminator();
        let b = RecordKind::CapabilityToken.discriminator();
        let c = RecordKind::Credential.discriminator();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_kind_from_encoded_record() {
        let entry = VaultEntry::new(owner(), deck(), 1_000, 3, 100);
        let bytes = entry.encode().unwrap();
        assert_eq!(
            RecordKind::from_discriminator(&bytes),
            Some(RecordKind::VaultEntry)
        );
        assert_eq!(RecordKind::from_discriminator(&[0u8; 4]), None);
    }

    #[test]
    fn test_vault_entry_starts_at_one() {
        let entry = VaultEntry::new(owner(), deck(), 1_000, 3, 100);
        assert_eq!(entry.streak_counter, 1);
        assert_eq!(entry.start_time, entry.last_check_in_time);
        assert!(!entry.target_met());

        let single = VaultEntry::new(owner(), deck(), 1_000, 1, 100);
        assert!(single.target_met());
    }

    #[test]
    fn test_vault_entry_decode() {
        let mut entry = VaultEntry::new(owner(), deck(), 1_000_000_000, 2, 1_700_000_000);
        entry.streak_counter = 2;
        entry.last_check_in_time = 1_700_080_000;

        let decoded = VaultEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_encoding_deterministic() {
        let entry = VaultEntry::new(owner(), deck(), 5, 2, -1);
        assert_eq!(entry.encode().unwrap(), entry.clone().encode().unwrap());
    }

    #[test]
    fn test_decode_as_wrong_kind_fails() {
        let token = CapabilityToken::new(owner(), deck(), 10);
        let bytes = token.encode().unwrap();
        assert!(matches!(
            VaultEntry::decode(&bytes),
            Err(CoreError::DiscriminatorMismatch { .. })
        ));
    }

    #[test]
    fn test_token_activation_once() {
        let mut token = CapabilityToken::new(owner(), deck(), 10);
        assert!(!token.is_activated());

        assert!(token.activate(20));
        assert!(!token.activate(30));
        assert_eq!(token.state, CapabilityState::Activated { activated_at: 20 });

        let decoded = CapabilityToken::decode(&token.encode().unwrap()).unwrap();
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_consume_requires_activation() {
        let token = CapabilityToken::new(owner(), deck(), 10);
        assert_eq!(token.consume(11), Err(ProtocolError::NotActivated));

        let mut token = CapabilityToken::new(owner(), deck(), 10);
        token.activate(12);
        let credential = token.consume(13).unwrap();
        assert_eq!(credential.owner, owner());
        assert_eq!(credential.deck_id, deck());
        assert_eq!(credential.issued_at, 13);
    }

    #[test]
    fn test_record_addresses() {
        let token = CapabilityToken::new(owner(), deck(), 0);
        assert_eq!(token.address(), Address::capability(&owner(), &deck()));

        let credential = Credential {
            owner: owner(),
            deck_id: deck(),
            issued_at: 0,
        };
        assert_eq!(credential.address(), Address::credential(&owner(), &deck()));
        assert_ne!(token.address(), credential.address());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn vault_entry_decodes_to_itself(
                seed in any::<[u8; 32]>(),
                deck in "[a-z0-9-]{1,32}",
                deposit in 1u64..,
                target in 1u32..,
                counter in 1u32..,
                start in any::<i64>(),
            ) {
                let entry = VaultEntry {
                    owner: Keypair::from_seed(&seed).identity(),
                    deck_id: DeckId::new(deck).unwrap(),
                    deposit_amount: deposit,
                    start_time: start,
                    last_check_in_time: start,
                    streak_target: target,
                    streak_counter: counter,
                };
                let bytes = entry.encode().unwrap();
                prop_assert_eq!(&bytes, &entry.encode().unwrap());
                prop_assert_eq!(VaultEntry::decode(&bytes).unwrap(), entry);
            }
        }
    }
}
