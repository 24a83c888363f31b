//! Proptest generators for property-based testing.

use proptest::prelude::*;

use streak_vault_core::{Address, DeckId, Identity, Keypair, Lamports, MAX_DECK_ID_LENGTH};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random identity.
pub fn identity() -> impl Strategy<Value = Identity> {
    keypair().prop_map(|kp| kp.identity())
}

/// Generate a deck id string that passes validation.
pub fn deck_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}".prop_map(String::from)
}

/// Generate a validated deck id.
pub fn deck_id() -> impl Strategy<Value = DeckId> {
    deck_name().prop_filter_map("valid deck id", |name| DeckId::new(name).ok())
}

/// Generate a deck id string that fails validation.
pub fn invalid_deck_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        prop::collection::vec(any::<char>(), MAX_DECK_ID_LENGTH + 1..=MAX_DECK_ID_LENGTH + 8)
            .prop_map(|chars| chars.into_iter().collect()),
    ]
}

/// Generate a nonzero deposit that a fixture user can afford.
pub fn deposit() -> impl Strategy<Value = Lamports> {
    1u64..=10_000_000_000u64
}

/// Generate a nonzero streak target.
pub fn streak_target() -> impl Strategy<Value = u32> {
    1u32..=30u32
}

/// Parameters for opening a vault.
#[derive(Debug, Clone)]
pub struct VaultParams {
    pub keypair: Keypair,
    pub deck_id: DeckId,
    pub deposit_amount: Lamports,
    pub streak_target: u32,
}

impl VaultParams {
    pub fn owner(&self) -> Identity {
        self.keypair.identity()
    }

    pub fn vault_address(&self) -> Address {
        Address::vault(&self.owner(), &self.deck_id)
    }
}

impl Arbitrary for VaultParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (keypair(), deck_id(), deposit(), streak_target())
            .prop_map(|(keypair, deck_id, deposit_amount, streak_target)| VaultParams {
                keypair,
                deck_id,
                deposit_amount,
                streak_target,
            })
            .boxed()
    }
}
