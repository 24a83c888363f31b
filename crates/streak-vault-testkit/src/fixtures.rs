//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use streak_vault::{Host, HostConfig, HostError, Outcome};
use streak_vault_core::{
    Identity, Instruction, Keypair, Lamports, Timestamp, Transaction, TransactionBuilder,
};
use streak_vault_store::{ManualClock, MemoryLedger};

/// Where every fixture clock starts.
pub const START: Timestamp = 1_700_000_000;

/// One day in seconds. Always a valid check-in gap under default config.
pub const DAY: i64 = 24 * 60 * 60;

/// Airdrop given to each fixture user.
pub const FUNDS: Lamports = 55_000_000_000;

/// A host over a fresh memory ledger, driven by a manual clock.
pub struct TestFixture {
    pub clock: Arc<ManualClock>,
    pub host: Host<MemoryLedger>,
    nonce: AtomicU64,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let host =
            Host::new(MemoryLedger::new(), clock.clone(), config).expect("valid fixture config");
        Self {
            clock,
            host,
            nonce: AtomicU64::new(0),
        }
    }

    /// A deterministic keypair whose wallet holds [`FUNDS`].
    pub fn user(&self, seed: u8) -> Keypair {
        let keypair = Keypair::from_seed(&[seed; 32]);
        self.host
            .airdrop(&keypair.identity(), FUNDS)
            .expect("airdrop to fixture user");
        keypair
    }

    pub fn balance_of(&self, identity: &Identity) -> Lamports {
        self.host
            .wallet_balance(identity)
            .expect("read wallet balance")
    }

    /// Sign `instructions` as one transaction stamped with the current clock.
    ///
    /// Every call gets a fresh nonce, so repeating a request is a new
    /// transaction rather than a replay.
    pub fn sign(&self, keypair: &Keypair, instructions: Vec<Instruction>) -> Transaction {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        instructions
            .into_iter()
            .fold(
                TransactionBuilder::new(keypair.identity())
                    .issued_at(self.host.now())
                    .nonce(nonce),
                |builder, instruction| builder.instruction(instruction),
            )
            .sign(keypair)
            .expect("sign fixture transaction")
    }

    /// Sign and execute.
    pub fn run(
        &self,
        keypair: &Keypair,
        instructions: Vec<Instruction>,
    ) -> Result<Vec<Outcome>, HostError> {
        self.host.execute(&self.sign(keypair, instructions))
    }

    pub fn initialize_vault(
        &self,
        keypair: &Keypair,
        deck_id: &str,
        deposit_amount: Lamports,
        streak_target: u32,
    ) -> Result<Vec<Outcome>, HostError> {
        self.run(
            keypair,
            vec![Instruction::InitializeVault {
                deck_id: deck_id.into(),
                deposit_amount,
                streak_target,
            }],
        )
    }

    pub fn check_in(&self, keypair: &Keypair, deck_id: &str) -> Result<Vec<Outcome>, HostError> {
        self.run(
            keypair,
            vec![Instruction::CheckIn {
                owner: keypair.identity(),
                deck_id: deck_id.into(),
            }],
        )
    }

    /// Withdraw, preceded by `InitializeCapability` in the same transaction.
    pub fn withdraw(&self, keypair: &Keypair, deck_id: &str) -> Result<Vec<Outcome>, HostError> {
        self.run(
            keypair,
            vec![
                Instruction::InitializeCapability {
                    deck_id: deck_id.into(),
                },
                Instruction::Withdraw {
                    owner: keypair.identity(),
                    deck_id: deck_id.into(),
                },
            ],
        )
    }

    pub fn issue_credential(
        &self,
        keypair: &Keypair,
        deck_id: &str,
    ) -> Result<Vec<Outcome>, HostError> {
        self.run(
            keypair,
            vec![Instruction::IssueCredential {
                deck_id: deck_id.into(),
            }],
        )
    }

    /// Check in once a day until the counter reaches `target`.
    pub fn complete_streak(&self, keypair: &Keypair, deck_id: &str, target: u32) {
        for _ in 1..target {
            self.clock.advance(DAY);
            self.check_in(keypair, deck_id).expect("daily check-in");
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Funded users on one fixture, for multi-party tests.
pub fn multi_party_fixtures(fixture: &TestFixture, count: usize) -> Vec<Keypair> {
    (0..count).map(|i| fixture.user(i as u8 + 1)).collect()
}
