//! # Hashing Utilities
//!
//! SHA-256 is the only hash function the ledger uses. It shows up in three
//! places, and all three are consensus-critical:
//!
//! - **Signing hash**: signatures are computed over `SHA-256(payload)`.
//! - **Transaction hash**: results echo `SHA-256(raw envelope)` as hex.
//! - **App hash**: each block chains `SHA-256(parent || batch digest)`.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of the input.
///
/// # Example
///
/// ```
/// use kestrel_protocol::crypto::sha256;
///
/// let digest = sha256(b"kestrel");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash several byte strings as if they were concatenated, without
/// allocating the concatenation.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Transaction hash as reported in results and logs: upper-case hex of the
/// SHA-256 of the raw envelope bytes exactly as received.
pub fn tx_hash(raw_tx: &[u8]) -> String {
    hex::encode_upper(sha256(raw_tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn multi_matches_concatenation() {
        let joined = sha256(b"parentdigest");
        let parts = sha256_multi(&[b"parent", b"digest"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn tx_hash_is_upper_hex() {
        let h = tx_hash(b"abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, h.to_uppercase());
        assert!(h.starts_with("BA7816BF"));
    }
}
