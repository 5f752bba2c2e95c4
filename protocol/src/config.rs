//! # Protocol Configuration & Constants
//!
//! Every magic number the ledger depends on lives here. Most of these are
//! consensus-critical: two nodes that disagree on a prefix or a size limit
//! will disagree on state, and there is no graceful way back from that.

// ---------------------------------------------------------------------------
// Application Identity
// ---------------------------------------------------------------------------

/// Application name reported through the `Info` callback.
pub const APP_NAME: &str = "kestrel";

/// Software version of the state machine.
pub const APP_VERSION: &str = "0.1.0";

/// Application protocol version. Bump whenever state transition rules change,
/// since nodes on different versions will compute different app hashes.
pub const APP_PROTOCOL_VERSION: u64 = 1;

/// Chain id used by the devnet harness and the transaction builder when the
/// caller does not set one.
pub const DEFAULT_CHAIN_ID: &str = "kestrel-devnet";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 public key length in bytes. Account keys are raw public keys.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// SHA-256 digest length. Used for the signing hash, tx hashes and app hashes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// The reserved faucet account: 32 zero bytes. The all-zero encoding is a
/// small-order point, which strict verification rejects, so no signature can
/// ever be produced for it. Funds leave it only through the faucet rule in
/// the executor.
pub const FAUCET_PUBLIC_KEY: [u8; PUBLIC_KEY_LENGTH] = [0u8; PUBLIC_KEY_LENGTH];

/// Balance credited to the faucet at genesis: the entire supply.
pub const FAUCET_GENESIS_BALANCE: u64 = u64::MAX;

/// Parent app hash used when computing the genesis app hash.
pub const GENESIS_PARENT_HASH: [u8; HASH_OUTPUT_LENGTH] = [0u8; HASH_OUTPUT_LENGTH];

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum raw transaction size accepted by admission and by the codec.
pub const MAX_TX_SIZE_BYTES: usize = 64 * 1024;

/// Maximum raw query payload size.
pub const MAX_QUERY_SIZE_BYTES: usize = 4 * 1024;

// ---------------------------------------------------------------------------
// Storage Layout
// ---------------------------------------------------------------------------

/// Key prefix for account records: `account:<public key bytes>`.
pub const ACCOUNT_KEY_PREFIX: &[u8] = b"account:";

/// Key prefix for key-value records: `kv:<utf-8 key>`.
pub const KV_KEY_PREFIX: &[u8] = b"kv:";

/// Key prefix for chain bookkeeping records.
pub const META_KEY_PREFIX: &[u8] = b"meta:";

/// Name of the chain metadata record under [`META_KEY_PREFIX`].
pub const META_CHAIN: &[u8] = b"chain";

// ---------------------------------------------------------------------------
// Query Paths
// ---------------------------------------------------------------------------

/// Query path for account lookups. Data is the raw 32-byte public key.
pub const QUERY_PATH_ACCOUNT: &str = "/account";

/// Query path for key-value lookups. Data is the UTF-8 key.
pub const QUERY_PATH_KV: &str = "/kv";
