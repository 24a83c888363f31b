//! Client-side flows over a [`Connection`].
//!
//! Each helper builds one transaction stamped with the connection's clock
//! and a random nonce, signs it, and sends it.

use streak_vault::{Connection, Outcome, Result};
use streak_vault_core::{Instruction, Keypair, Lamports, TransactionBuilder};

/// Sign `instructions` as one transaction and send it.
pub async fn send(
    conn: &dyn Connection,
    keypair: &Keypair,
    instructions: Vec<Instruction>,
) -> Result<Vec<Outcome>> {
    let now = conn.now().await?;
    let tx = instructions
        .into_iter()
        .fold(
            TransactionBuilder::new(keypair.identity())
                .issued_at(now)
                .nonce(rand::random()),
            |builder, instruction| builder.instruction(instruction),
        )
        .sign(keypair)?;
    conn.send_transaction(tx).await
}

pub async fn initialize_vault(
    conn: &dyn Connection,
    keypair: &Keypair,
    deck_id: &str,
    deposit_amount: Lamports,
    streak_target: u32,
) -> Result<Vec<Outcome>> {
    send(
        conn,
        keypair,
        vec![Instruction::InitializeVault {
            deck_id: deck_id.into(),
            deposit_amount,
            streak_target,
        }],
    )
    .await
}

pub async fn check_in(
    conn: &dyn Connection,
    keypair: &Keypair,
    deck_id: &str,
) -> Result<Vec<Outcome>> {
    send(
        conn,
        keypair,
        vec![Instruction::CheckIn {
            owner: keypair.identity(),
            deck_id: deck_id.into(),
        }],
    )
    .await
}

/// Create the capability token and withdraw in one transaction, so the
/// withdrawal's activation always finds a token.
pub async fn withdraw(
    conn: &dyn Connection,
    keypair: &Keypair,
    deck_id: &str,
) -> Result<Vec<Outcome>> {
    send(
        conn,
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
    .await
}

pub async fn issue_credential(
    conn: &dyn Connection,
    keypair: &Keypair,
    deck_id: &str,
) -> Result<Vec<Outcome>> {
    send(
        conn,
        keypair,
        vec![Instruction::IssueCredential {
            deck_id: deck_id.into(),
        }],
    )
    .await
}
