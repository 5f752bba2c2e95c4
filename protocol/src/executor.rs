//! # Transaction Executor
//!
//! Turns a verified [`Transaction`] into the writes it implies, given a view
//! of the ledger. The executor never writes: it returns a list of
//! [`Mutation`]s that the caller stages into the open batch. A rejected
//! transaction yields no mutations at all.
//!
//! ## Rules
//!
//! | Operation     | Checks                                                   | Writes                           |
//! |---------------|----------------------------------------------------------|----------------------------------|
//! | CreateAccount | 32-byte key                                              | zero-balance account if absent   |
//! | KeyValue      | none                                                     | upsert                           |
//! | TokenTransfer | 32-byte keys, authorization, sender exists, funds, no overflow | debit `from`, credit `to`  |
//!
//! The signer may only spend from its own account, except that anyone may
//! draw from the faucet. Self-transfers pass the same checks and change
//! nothing.

use thiserror::Error;

use crate::config::{FAUCET_PUBLIC_KEY, PUBLIC_KEY_LENGTH};
use crate::storage::{AccountRecord, KvRecord, LedgerView, Mutation, StoreError};
use crate::transaction::{
    BodyResult, CreateAccountOp, KeyValueOp, ResultCode, TokenTransferOp, Transaction,
    TransactionBody,
};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Why a verified transaction was not applied.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{field} must be a 32-byte public key, got {len} bytes")]
    InvalidPublicKey { field: &'static str, len: usize },

    #[error("signer {signer} may not spend from account {from}")]
    Unauthorized { signer: String, from: String },

    #[error("account {0} does not exist")]
    UnknownAccount(String),

    #[error("insufficient funds in {account}: balance {balance}, need {amount}")]
    InsufficientFunds {
        account: String,
        balance: u64,
        amount: u64,
    },

    #[error("crediting {amount} to {account} overflows its balance")]
    BalanceOverflow { account: String, amount: u64 },

    #[error("ledger read failed: {0}")]
    Store(#[from] StoreError),
}

impl ExecutionError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            ExecutionError::InvalidPublicKey { .. }
            | ExecutionError::UnknownAccount(_)
            | ExecutionError::BalanceOverflow { .. } => ResultCode::InvalidRequest,
            ExecutionError::Unauthorized { .. } => ResultCode::Unauthorized,
            ExecutionError::InsufficientFunds { .. } => ResultCode::InsufficientFunds,
            ExecutionError::Store(_) => ResultCode::Internal,
        }
    }
}

/// Writes and result of a successfully executed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub mutations: Vec<Mutation>,
    pub body_result: BodyResult,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Execute `tx` against `view`. The signature must already be verified.
pub fn execute<V: LedgerView + ?Sized>(
    view: &V,
    tx: &Transaction,
) -> Result<Execution, ExecutionError> {
    match &tx.body {
        TransactionBody::CreateAccount(op) => create_account(view, op),
        TransactionBody::KeyValue(op) => Ok(key_value(op)),
        TransactionBody::TokenTransfer(op) => token_transfer(view, &tx.header.sender, op),
    }
}

fn check_key(field: &'static str, key: &[u8]) -> Result<(), ExecutionError> {
    if key.len() != PUBLIC_KEY_LENGTH {
        return Err(ExecutionError::InvalidPublicKey {
            field,
            len: key.len(),
        });
    }
    Ok(())
}

fn create_account<V: LedgerView + ?Sized>(
    view: &V,
    op: &CreateAccountOp,
) -> Result<Execution, ExecutionError> {
    check_key("public_key", &op.public_key)?;

    let mutations = match view.get_account(&op.public_key)? {
        Some(_) => Vec::new(),
        None => vec![Mutation::PutAccount(AccountRecord::new(
            op.public_key.clone(),
            0,
        ))],
    };

    Ok(Execution {
        mutations,
        body_result: BodyResult::CreateAccount,
    })
}

fn key_value(op: &KeyValueOp) -> Execution {
    Execution {
        mutations: vec![Mutation::PutKv(KvRecord {
            key: op.key.clone(),
            value: op.value.clone(),
        })],
        body_result: BodyResult::KeyValue,
    }
}

fn token_transfer<V: LedgerView + ?Sized>(
    view: &V,
    signer: &[u8],
    op: &TokenTransferOp,
) -> Result<Execution, ExecutionError> {
    check_key("from", &op.from)?;
    check_key("to", &op.to)?;

    if op.from != signer && op.from != FAUCET_PUBLIC_KEY {
        return Err(ExecutionError::Unauthorized {
            signer: hex::encode(signer),
            from: hex::encode(&op.from),
        });
    }

    let sender = view
        .get_account(&op.from)?
        .ok_or_else(|| ExecutionError::UnknownAccount(hex::encode(&op.from)))?;

    if sender.balance < op.amount {
        return Err(ExecutionError::InsufficientFunds {
            account: hex::encode(&op.from),
            balance: sender.balance,
            amount: op.amount,
        });
    }

    if op.from == op.to {
        return Ok(Execution {
            mutations: Vec::new(),
            body_result: BodyResult::TokenTransfer,
        });
    }

    let receiver = view
        .get_account(&op.to)?
        .unwrap_or_else(|| AccountRecord::new(op.to.clone(), 0));
    let credited = receiver
        .balance
        .checked_add(op.amount)
        .ok_or_else(|| ExecutionError::BalanceOverflow {
            account: hex::encode(&op.to),
            amount: op.amount,
        })?;

    Ok(Execution {
        mutations: vec![
            Mutation::PutAccount(AccountRecord::new(
                op.from.clone(),
                sender.balance - op.amount,
            )),
            Mutation::PutAccount(AccountRecord::new(op.to.clone(), credited)),
        ],
        body_result: BodyResult::TokenTransfer,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
