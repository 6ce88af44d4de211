//! # Instructions
//!
//! Every ledger operation as a value. Clients build an [`Instruction`],
//! sign its canonical bytes, and ship a [`SignedInstruction`]; the ledger
//! authenticates it into a [`Caller`] and dispatches.
//!
//! ## Canonical bytes
//!
//! `INSTRUCTION_SIGNING_DOMAIN || bincode(instruction)`. bincode with
//! fixed-width integers and length-prefixed sequences is deterministic for
//! these types, and the domain tag keeps a signature over an instruction
//! from being replayed as a signature over anything else.
//!
//! A signature proves who asked. It does not stop the same request from
//! being submitted twice; nonces do that.

use serde::{Deserialize, Serialize};

use super::Ledger;
use crate::address::Address;
use crate::amount::EncodedAmount;
use crate::config::{COMMITMENT_SIZE, INSTRUCTION_SIGNING_DOMAIN};
use crate::crypto::keys::Keypair;
use crate::error::LedgerResult;
use crate::events::LedgerEvent;
use crate::identity::{Caller, Identity};
use crate::storage::LedgerStore;

/// One ledger operation with all its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    InitializeMint {
        config: Vec<u8>,
    },
    InitializeBalance {
        owner: Identity,
    },
    Deposit {
        owner: Identity,
        amount: u64,
        encoded_amount: EncodedAmount,
    },
    Withdraw {
        owner: Identity,
        amount: u64,
        encoded_amount: EncodedAmount,
    },
    PrivateTransfer {
        sender: Identity,
        receiver: Identity,
        encoded_amount: EncodedAmount,
        expected_nonce: u64,
        commitment: [u8; COMMITMENT_SIZE],
        tag: [u8; COMMITMENT_SIZE],
    },
    CreateTransfer {
        sender: Identity,
        recipient: Identity,
        encoded_amount: EncodedAmount,
        nonce: u64,
    },
    ClaimTransfer {
        address: Address,
    },
    CancelTransfer {
        address: Address,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::InitializeMint { .. } => "initialize_mint",
            Instruction::InitializeBalance { .. } => "initialize_balance",
            Instruction::Deposit { .. } => "deposit",
            Instruction::Withdraw { .. } => "withdraw",
            Instruction::PrivateTransfer { .. } => "private_transfer",
            Instruction::CreateTransfer { .. } => "create_transfer",
            Instruction::ClaimTransfer { .. } => "claim_transfer",
            Instruction::CancelTransfer { .. } => "cancel_transfer",
        }
    }

    /// The bytes a signer signs.
    pub fn signing_bytes(&self) -> LedgerResult<Vec<u8>> {
        let body = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(INSTRUCTION_SIGNING_DOMAIN.len() + body.len());
        bytes.extend_from_slice(INSTRUCTION_SIGNING_DOMAIN);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }
}

/// An instruction with its claimed signer and, normally, a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInstruction {
    pub instruction: Instruction,
    pub signer: Identity,
    pub signature: Option<Vec<u8>>,
}

impl SignedInstruction {
    /// Sign `instruction` with `keypair`.
    pub fn sign(instruction: Instruction, keypair: &Keypair) -> LedgerResult<Self> {
        let signature = keypair.sign(&instruction.signing_bytes()?);
        Ok(Self {
            instruction,
            signer: keypair.identity(),
            signature: Some(signature.to_vec()),
        })
    }

    /// An instruction that claims `signer` but carries no proof.
    pub fn unsigned(instruction: Instruction, signer: Identity) -> Self {
        Self {
            instruction,
            signer,
            signature: None,
        }
    }

    /// Check the signature.
    pub fn authenticate(&self) -> LedgerResult<Caller> {
        let message = self.instruction.signing_bytes()?;
        Ok(Caller::from_signature(
            self.signer,
            &message,
            self.signature.as_deref(),
        ))
    }
}

impl<S: LedgerStore> Ledger<S> {
    /// Run `instruction` on behalf of `caller`.
    pub fn execute(&self, caller: &Caller, instruction: &Instruction) -> LedgerResult<LedgerEvent> {
        match instruction {
            Instruction::InitializeMint { config } => self.initialize_mint(caller, config),
            Instruction::InitializeBalance { owner } => self.initialize_balance(caller, owner),
            Instruction::Deposit {
                owner,
                amount,
                encoded_amount,
            } => self.deposit(caller, owner, *amount, encoded_amount),
            Instruction::Withdraw {
                owner,
                amount,
                encoded_amount,
            } => self.withdraw(caller, owner, *amount, encoded_amount),
            Instruction::PrivateTransfer {
                sender,
                receiver,
                encoded_amount,
                expected_nonce,
                commitment,
                tag,
            } => self.private_transfer(
                caller,
                sender,
                receiver,
                encoded_amount,
                *expected_nonce,
                *commitment,
                *tag,
            ),
            Instruction::CreateTransfer {
                sender,
                recipient,
                encoded_amount,
                nonce,
            } => self.create_transfer(caller, sender, recipient, encoded_amount, *nonce),
            Instruction::ClaimTransfer { address } => self.claim_transfer(caller, address),
            Instruction::CancelTransfer { address } => self.cancel_transfer(caller, address),
        }
    }

    /// Authenticate and run a signed instruction.
    pub fn submit(&self, signed: &SignedInstruction) -> LedgerResult<LedgerEvent> {
        let caller = signed.authenticate()?;
        self.execute(&caller, &signed.instruction)
    }
}
