//! Ledger record types and their storage keys.
//!
//! | Key                     | Value                  |
//! |-------------------------|------------------------|
//! | `account:<pk bytes>`    | `bincode(AccountRecord)` |
//! | `kv:<utf-8 key>`        | `bincode(KvRecord)`    |
//! | `meta:chain`            | `bincode(ChainMeta)`   |
//!
//! The prefixes are chosen so that no namespace is a prefix of another.

use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::config::{
    ACCOUNT_KEY_PREFIX, HASH_OUTPUT_LENGTH, KV_KEY_PREFIX, META_CHAIN, META_KEY_PREFIX,
};

/// An account and its balance. Keyed by the raw public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub public_key: Vec<u8>,
    pub balance: u64,
}

impl AccountRecord {
    pub fn new(public_key: impl Into<Vec<u8>>, balance: u64) -> Self {
        Self {
            public_key: public_key.into(),
            balance,
        }
    }
}

/// An application-defined string entry. Last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvRecord {
    pub key: String,
    pub value: String,
}

/// Chain progress persisted alongside each block's writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMeta {
    pub chain_id: String,
    /// Height of the last committed block. `initial_height - 1` right after
    /// genesis.
    pub last_height: u64,
    pub app_hash: [u8; HASH_OUTPUT_LENGTH],
}

/// A single state write produced by executing a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    PutAccount(AccountRecord),
    PutKv(KvRecord),
}

impl Mutation {
    pub fn storage_key(&self) -> Vec<u8> {
        match self {
            Mutation::PutAccount(account) => account_key(&account.public_key),
            Mutation::PutKv(kv) => kv_key(&kv.key),
        }
    }

    pub fn encode_value(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Mutation::PutAccount(account) => codec::encode(account),
            Mutation::PutKv(kv) => codec::encode(kv),
        }
    }
}

fn prefixed(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + suffix.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(suffix);
    key
}

pub fn account_key(public_key: &[u8]) -> Vec<u8> {
    prefixed(ACCOUNT_KEY_PREFIX, public_key)
}

pub fn kv_key(key: &str) -> Vec<u8> {
    prefixed(KV_KEY_PREFIX, key.as_bytes())
}

pub fn chain_meta_key() -> Vec<u8> {
    prefixed(META_KEY_PREFIX, META_CHAIN)
}
