//! Address types for quorum
//!
//! An address is always 20 bytes derived from a public key. Which hash is used
//! depends on the key's curve; the bech32 prefix is chosen by the caller at
//! display time and is never part of the address identity.

use bech32::{Bech32, Hrp};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Length of every account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Address encoding and decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid bech32 prefix: {0}")]
    InvalidPrefix(String),

    #[error("bech32 encoding failed: {0}")]
    Encode(String),

    #[error("bech32 decoding failed: {0}")]
    Decode(String),

    #[error("invalid address length: expected {ADDRESS_LEN}, got {0}")]
    InvalidLength(usize),

    #[error("unexpected bech32 prefix: expected {expected}, got {actual}")]
    PrefixMismatch { expected: String, actual: String },
}

/// Account address - 20 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccAddress([u8; ADDRESS_LEN]);

impl AccAddress {
    /// Wrap raw address bytes
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an address from a byte slice that must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let bytes: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// ripemd160(sha256(bytes)), used for compressed secp256k1 keys
    pub fn from_ripemd160_sha256(bytes: &[u8]) -> Self {
        let sha256_hash = Sha256::digest(bytes);
        let ripemd160_hash = Ripemd160::digest(sha256_hash);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&ripemd160_hash);
        Self(out)
    }

    /// sha256(bytes) truncated to 20 bytes, used for ed25519 and threshold keys
    pub fn from_truncated_sha256(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&hash[..ADDRESS_LEN]);
        Self(out)
    }

    /// Convert to a bech32 string with the given human-readable prefix
    pub fn to_bech32(&self, prefix: &str) -> Result<String, AddressError> {
        let hrp = Hrp::parse(prefix).map_err(|e| AddressError::InvalidPrefix(e.to_string()))?;
        bech32::encode::<Bech32>(hrp, &self.0).map_err(|e| AddressError::Encode(e.to_string()))
    }

    /// Parse from a bech32 string, returning the prefix alongside the address
    pub fn from_bech32(s: &str) -> Result<(String, Self), AddressError> {
        let (hrp, data) = bech32::decode(s).map_err(|e| AddressError::Decode(e.to_string()))?;
        let addr = Self::from_slice(&data)?;
        Ok((hrp.as_str().to_string(), addr))
    }

    /// Parse from a bech32 string and require a specific prefix
    pub fn from_bech32_with_prefix(s: &str, expected: &str) -> Result<Self, AddressError> {
        let (prefix, addr) = Self::from_bech32(s)?;
        if prefix != expected {
            return Err(AddressError::PrefixMismatch {
                expected: expected.to_string(),
                actual: prefix,
            });
        }
        Ok(addr)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

// Upper-case hex, matching the ledger's raw address logging
impl fmt::Display for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl From<[u8; ADDRESS_LEN]> for AccAddress {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bech32_round_trip() {
        let addr = AccAddress::from_ripemd160_sha256(&[2u8; 33]);
        let encoded = addr.to_bech32("cosmos").unwrap();
        assert!(encoded.starts_with("cosmos1"));

        let (prefix, decoded) = AccAddress::from_bech32(&encoded).unwrap();
        assert_eq!(prefix, "cosmos");
        assert_eq!(decoded, addr);
    }

    #[test]
    fn test_prefix_changes_display_not_identity() {
        let addr = AccAddress::from_truncated_sha256(b"key material");
        let a = addr.to_bech32("wasm").unwrap();
        let b = addr.to_bech32("osmo").unwrap();
        assert_ne!(a, b);
        assert_eq!(AccAddress::from_bech32(&a).unwrap().1, AccAddress::from_bech32(&b).unwrap().1);
    }

    #[test]
    fn test_prefix_mismatch() {
        let encoded = AccAddress::new([7u8; 20]).to_bech32("wasm").unwrap();
        let err = AccAddress::from_bech32_with_prefix(&encoded, "cosmos").unwrap_err();
        assert_eq!(
            err,
            AddressError::PrefixMismatch {
                expected: "cosmos".to_string(),
                actual: "wasm".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_prefix_is_an_error() {
        let addr = AccAddress::new([1u8; 20]);
        assert!(matches!(addr.to_bech32(""), Err(AddressError::InvalidPrefix(_))));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            AccAddress::from_slice(&[0u8; 32]),
            Err(AddressError::InvalidLength(32))
        );
    }

    #[test]
    fn test_derivations_differ() {
        let bytes = [3u8; 33];
        assert_ne!(
            AccAddress::from_ripemd160_sha256(&bytes),
            AccAddress::from_truncated_sha256(&bytes)
        );
    }

    #[test]
    fn test_display_is_upper_hex() {
        let addr = AccAddress::new([0xab; 20]);
        assert_eq!(addr.to_string(), "AB".repeat(20));
    }

    proptest! {
        #[test]
        fn prop_derivation_is_pure(bytes in proptest::collection::vec(any::<u8>(), 1..80)) {
            prop_assert_eq!(
                AccAddress::from_ripemd160_sha256(&bytes),
                AccAddress::from_ripemd160_sha256(&bytes)
            );
            prop_assert_eq!(
                AccAddress::from_truncated_sha256(&bytes),
                AccAddress::from_truncated_sha256(&bytes)
            );
        }
    }
}
