//! Instructions and signed transactions.
//!
//! A transaction is an ordered list of instructions signed by one identity.
//! The signer is the caller of every instruction it carries.

use ciborium::value::Value;

use crate::canonical::{encode_canonical, int_map};
use crate::crypto::{Identity, Keypair, Signature};
use crate::error::CoreError;
use crate::types::{Lamports, Timestamp};

/// Domain separation prefix for transaction signatures.
const TX_DOMAIN: &[u8] = b"streak-vault-tx-v1:";

/// One protocol operation.
///
/// Deck ids are carried unvalidated so the programs can reject them with a
/// protocol error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Open a vault for (signer, deck).
    InitializeVault {
        deck_id: String,
        deposit_amount: Lamports,
        streak_target: u32,
    },
    /// Record a check-in on `owner`'s vault.
    CheckIn { owner: Identity, deck_id: String },
    /// Release `owner`'s vault and activate the matching capability.
    Withdraw { owner: Identity, deck_id: String },
    /// Create a capability token for (signer, deck).
    InitializeCapability { deck_id: String },
    /// Activate `owner`'s capability token directly.
    ActivateCapability { owner: Identity, deck_id: String },
    /// Spend the signer's activated token and mint the credential.
    IssueCredential { deck_id: String },
}

impl Instruction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::InitializeVault { .. } => "initialize_vault",
            Instruction::CheckIn { .. } => "check_in",
            Instruction::Withdraw { .. } => "withdraw",
            Instruction::InitializeCapability { .. } => "initialize_capability",
            Instruction::ActivateCapability { .. } => "activate_capability",
            Instruction::IssueCredential { .. } => "issue_credential",
        }
    }

    fn tag(&self) -> u64 {
        match self {
            Instruction::InitializeVault { .. } => 0,
            Instruction::CheckIn { .. } => 1,
            Instruction::Withdraw { .. } => 2,
            Instruction::InitializeCapability { .. } => 3,
            Instruction::ActivateCapability { .. } => 4,
            Instruction::IssueCredential { .. } => 5,
        }
    }

    /// Canonical CBOR form: key 0 is the tag, remaining keys are fields.
    pub fn to_value(&self) -> Value {
        let mut fields = vec![(0, Value::Integer(self.tag().into()))];
        match self {
            Instruction::InitializeVault {
                deck_id,
                deposit_amount,
                streak_target,
            } => {
                fields.push((1, Value::Text(deck_id.clone())));
                fields.push((2, Value::Integer((*deposit_amount).into())));
                fields.push((3, Value::Integer((*streak_target).into())));
            }
            Instruction::CheckIn { owner, deck_id }
            | Instruction::Withdraw { owner, deck_id }
            | Instruction::ActivateCapability { owner, deck_id } => {
                fields.push((1, Value::Bytes(owner.as_bytes().to_vec())));
                fields.push((2, Value::Text(deck_id.clone())));
            }
            Instruction::InitializeCapability { deck_id }
            | Instruction::IssueCredential { deck_id } => {
                fields.push((1, Value::Text(deck_id.clone())));
            }
        }
        int_map(fields)
    }
}

/// A signed, ordered batch of instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The caller of every instruction.
    pub signer: Identity,

    /// Signer-claimed creation time, checked against the host clock.
    pub issued_at: Timestamp,

    /// Distinguishes otherwise identical transactions signed in the same second.
    pub nonce: u64,

    pub instructions: Vec<Instruction>,

    /// Ed25519 signature over [`Transaction::signing_bytes`].
    pub signature: Signature,
}

impl Transaction {
    /// The exact bytes covered by the signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, CoreError> {
        signing_bytes(&self.signer, self.issued_at, self.nonce, &self.instructions)
    }

    /// Check the signature against the signer.
    pub fn verify(&self) -> Result<(), CoreError> {
        let message = self.signing_bytes()?;
        self.signer.verify(&message, &self.signature)
    }

    /// Blake3 hash over the signed bytes and signature.
    pub fn id(&self) -> Result<[u8; 32], CoreError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.signing_bytes()?);
        hasher.update(self.signature.as_bytes());
        Ok(*hasher.finalize().as_bytes())
    }
}

fn signing_bytes(
    signer: &Identity,
    issued_at: Timestamp,
    nonce: u64,
    instructions: &[Instruction],
) -> Result<Vec<u8>, CoreError> {
    let body = int_map(vec![
        (0, Value::Bytes(signer.as_bytes().to_vec())),
        (1, Value::Integer(issued_at.into())),
        (
            2,
            Value::Array(instructions.iter().map(Instruction::to_value).collect()),
        ),
        (3, Value::Integer(nonce.into())),
    ]);
    let mut message = TX_DOMAIN.to_vec();
    message.extend_from_slice(&encode_canonical(&body)?);
    Ok(message)
}

/// Builder for signed transactions.
pub struct TransactionBuilder {
    signer: Identity,
    issued_at: Timestamp,
    nonce: u64,
    instructions: Vec<Instruction>,
}

impl TransactionBuilder {
    /// Start building a transaction for `signer`.
    pub fn new(signer: Identity) -> Self {
        Self {
            signer,
            issued_at: 0,
            nonce: 0,
            instructions: Vec::new(),
        }
    }

    /// Set the issue time.
    pub fn issued_at(mut self, ts: Timestamp) -> Self {
        self.issued_at = ts;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Append an instruction.
    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// Build and sign the transaction.
    pub fn sign(self, keypair: &Keypair) -> Result<Transaction, CoreError> {
        let message = signing_bytes(
            &self.signer,
            self.issued_at,
            self.nonce,
            &self.instructions,
        )?;
        let signature = keypair.sign(&message);

        Ok(Transaction {
            signer: self.signer,
            issued_at: self.issued_at,
            nonce: self.nonce,
            instructions: self.instructions,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(keypair: &Keypair) -> Transaction {
        TransactionBuilder::new(keypair.identity())
            .issued_at(1_700_000_000)
            .instruction(Instruction::InitializeVault {
                deck_id: "kanji".into(),
                deposit_amount: 1_000_000_000,
                streak_target: 2,
            })
            .instruction(Instruction::CheckIn {
                owner: keypair.identity(),
                deck_id: "kanji".into(),
            })
            .sign(keypair)
            .unwrap()
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = Keypair::from_seed(&[5; 32]);
        let tx = sample(&keypair);
        assert_eq!(tx.instructions.len(), 2);
        tx.verify().unwrap();
    }

    #[test]
    fn test_tampered_instruction_rejected() {
        let keypair = Keypair::from_seed(&[5; 32]);
        let mut tx = sample(&keypair);
        tx.instructions[0] = Instruction::InitializeVault {
            deck_id: "kanji".into(),
            deposit_amount: 1,
            streak_target: 2,
        };
        assert!(matches!(tx.verify(), Err(CoreError::InvalidSignature)));
    }

    #[test]
    fn test_signer_swap_rejected() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let mut tx = sample(&alice);
        tx.signer = bob.identity();
        assert!(tx.verify().is_err());
    }

    #[test]
    fn test_instruction_order_is_signed() {
        let keypair = Keypair::from_seed(&[5; 32]);
        let mut tx = sample(&keypair);
        tx.instructions.reverse();
        assert!(tx.verify().is_err());
    }

    #[test]
    fn test_transaction_id_deterministic() {
        let keypair = Keypair::from_seed(&[5; 32]);
        let tx = sample(&keypair);
        assert_eq!(tx.id().unwrap(), tx.clone().id().unwrap());

        let later = TransactionBuilder::new(keypair.identity())
            .issued_at(1_700_000_001)
            .sign(&keypair)
            .unwrap();
        assert_ne!(tx.id().unwrap(), later.id().unwrap());
    }

    #[test]
    fn test_nonce_is_signed() {
        let keypair = Keypair::from_seed(&[5; 32]);
        let tx = sample(&keypair);
        let resigned = TransactionBuilder::new(keypair.identity())
            .issued_at(tx.issued_at)
            .nonce(1)
            .instruction(tx.instructions[0].clone())
            .instruction(tx.instructions[1].clone())
            .sign(&keypair)
            .unwrap();
        assert_ne!(tx.id().unwrap(), resigned.id().unwrap());

        let mut tampered = resigned;
        tampered.nonce = 2;
        assert!(tampered.verify().is_err());
    }

    #[test]
    fn test_instruction_names() {
        let ix = Instruction::IssueCredential {
            deck_id: "d".into(),
        };
        assert_eq!(ix.name(), "issue_credential");
    }
}
