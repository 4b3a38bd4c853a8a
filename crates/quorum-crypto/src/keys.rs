//! Key representations using static enum dispatch
//!
//! `PublicKey` is a sum type over single-signer keys and threshold keys. Every
//! consumer (encoding, address derivation, aggregation) matches on it
//! exhaustively.

use crate::multisig::{MultisigError, ThresholdPublicKey};
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{SigningKey as Ed25519PrivKey, VerifyingKey as Ed25519PubKey};
use k256::ecdsa::{SigningKey as Secp256k1PrivKey, VerifyingKey as Secp256k1PubKey};
use prost::encoding::encode_varint;
use quorum_codec::{Any, MessageExt, ProtobufError};
use quorum_types::{AccAddress, AddressError};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const ED25519_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.ed25519.PubKey";
pub const MULTISIG_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.multisig.LegacyAminoPubKey";

/// Compressed secp256k1 point length
pub const SECP256K1_PUBKEY_LEN: usize = 33;
/// Ed25519 public key length
pub const ED25519_PUBKEY_LEN: usize = 32;

// Amino registered-type prefixes ("tendermint/PubKeySecp256k1", "tendermint/PubKeyEd25519")
const AMINO_SECP256K1_PREFIX: [u8; 4] = [0xeb, 0x5a, 0xe9, 0x87];
const AMINO_ED25519_PREFIX: [u8; 4] = [0x16, 0x24, 0xde, 0x64];

/// Key parsing and encoding errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("invalid {algo} public key: {reason}")]
    InvalidPublicKey { algo: &'static str, reason: String },

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("unknown public key type: {0}")]
    UnknownKeyType(String),

    #[error("threshold keys cannot be members of another threshold key")]
    NestedThreshold,

    #[error("invalid base64 key encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error(transparent)]
    Protobuf(#[from] ProtobufError),

    #[error(transparent)]
    Multisig(#[from] MultisigError),
}

/// `cosmos.crypto.secp256k1.PubKey`
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct Secp256k1PubKeyProto {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

impl MessageExt for Secp256k1PubKeyProto {
    const TYPE_URL: &'static str = SECP256K1_PUBKEY_TYPE_URL;
}

/// `cosmos.crypto.ed25519.PubKey`
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct Ed25519PubKeyProto {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

impl MessageExt for Ed25519PubKeyProto {
    const TYPE_URL: &'static str = ED25519_PUBKEY_TYPE_URL;
}

/// A public key held by exactly one signer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinglePublicKey {
    Secp256k1(Secp256k1PubKey),
    Ed25519(Ed25519PubKey),
}

impl SinglePublicKey {
    /// Parse a 33-byte compressed secp256k1 key
    pub fn from_secp256k1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SECP256K1_PUBKEY_LEN {
            return Err(KeyError::InvalidPublicKey {
                algo: "secp256k1",
                reason: format!("expected {SECP256K1_PUBKEY_LEN} bytes, got {}", bytes.len()),
            });
        }
        let key = Secp256k1PubKey::from_sec1_bytes(bytes).map_err(|e| {
            KeyError::InvalidPublicKey {
                algo: "secp256k1",
                reason: e.to_string(),
            }
        })?;
        Ok(Self::Secp256k1(key))
    }

    /// Parse a 32-byte ed25519 key
    pub fn from_ed25519_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; ED25519_PUBKEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidPublicKey {
                algo: "ed25519",
                reason: format!("expected {ED25519_PUBKEY_LEN} bytes, got {}", bytes.len()),
            })?;
        let key = Ed25519PubKey::from_bytes(&bytes).map_err(|e| KeyError::InvalidPublicKey {
            algo: "ed25519",
            reason: e.to_string(),
        })?;
        Ok(Self::Ed25519(key))
    }

    /// Compressed key bytes; the sort key for threshold member ordering
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SinglePublicKey::Secp256k1(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            SinglePublicKey::Ed25519(key) => key.as_bytes().to_vec(),
        }
    }

    pub fn algo(&self) -> &'static str {
        match self {
            SinglePublicKey::Secp256k1(_) => "secp256k1",
            SinglePublicKey::Ed25519(_) => "ed25519",
        }
    }

    /// Derive the account address for this key
    pub fn address(&self) -> AccAddress {
        match self {
            SinglePublicKey::Secp256k1(_) => AccAddress::from_ripemd160_sha256(&self.to_bytes()),
            SinglePublicKey::Ed25519(_) => AccAddress::from_truncated_sha256(&self.to_bytes()),
        }
    }

    /// Get the Protobuf type URL for this key type
    pub fn type_url(&self) -> &'static str {
        match self {
            SinglePublicKey::Secp256k1(_) => SECP256K1_PUBKEY_TYPE_URL,
            SinglePublicKey::Ed25519(_) => ED25519_PUBKEY_TYPE_URL,
        }
    }

    /// Convert to Protobuf Any
    pub fn to_any(&self) -> Any {
        let key = self.to_bytes();
        match self {
            SinglePublicKey::Secp256k1(_) => Any::pack(&Secp256k1PubKeyProto { key }),
            SinglePublicKey::Ed25519(_) => Any::pack(&Ed25519PubKeyProto { key }),
        }
    }

    /// Create from Protobuf Any
    pub fn from_any(any: &Any) -> Result<Self, KeyError> {
        match any.type_url.as_str() {
            SECP256K1_PUBKEY_TYPE_URL => {
                let proto: Secp256k1PubKeyProto = any.unpack()?;
                Self::from_secp256k1_bytes(&proto.key)
            }
            ED25519_PUBKEY_TYPE_URL => {
                let proto: Ed25519PubKeyProto = any.unpack()?;
                Self::from_ed25519_bytes(&proto.key)
            }
            MULTISIG_PUBKEY_TYPE_URL => Err(KeyError::NestedThreshold),
            other => Err(KeyError::UnknownKeyType(other.to_string())),
        }
    }

    /// Amino binary encoding: registered prefix, uvarint length, key bytes
    pub fn amino_bytes(&self) -> Vec<u8> {
        let key = self.to_bytes();
        let prefix = match self {
            SinglePublicKey::Secp256k1(_) => AMINO_SECP256K1_PREFIX,
            SinglePublicKey::Ed25519(_) => AMINO_ED25519_PREFIX,
        };
        let mut out = Vec::with_capacity(prefix.len() + 1 + key.len());
        out.extend_from_slice(&prefix);
        encode_varint(key.len() as u64, &mut out);
        out.extend_from_slice(&key);
        out
    }

    fn from_type_and_bytes(type_url: &str, bytes: &[u8]) -> Result<Self, KeyError> {
        match type_url {
            SECP256K1_PUBKEY_TYPE_URL => Self::from_secp256k1_bytes(bytes),
            ED25519_PUBKEY_TYPE_URL => Self::from_ed25519_bytes(bytes),
            MULTISIG_PUBKEY_TYPE_URL => Err(KeyError::NestedThreshold),
            other => Err(KeyError::UnknownKeyType(other.to_string())),
        }
    }
}

/// All supported public key types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Single(SinglePublicKey),
    Threshold(ThresholdPublicKey),
}

impl PublicKey {
    /// Derive address from public key
    pub fn address(&self) -> AccAddress {
        match self {
            PublicKey::Single(key) => key.address(),
            PublicKey::Threshold(key) => key.address(),
        }
    }

    /// Get the Protobuf type URL for this key type
    pub fn type_url(&self) -> &'static str {
        match self {
            PublicKey::Single(key) => key.type_url(),
            PublicKey::Threshold(_) => MULTISIG_PUBKEY_TYPE_URL,
        }
    }

    /// Convert to Protobuf Any
    pub fn to_any(&self) -> Any {
        match self {
            PublicKey::Single(key) => key.to_any(),
            PublicKey::Threshold(key) => key.to_any(),
        }
    }

    /// Create from Protobuf Any
    pub fn from_any(any: &Any) -> Result<Self, KeyError> {
        if any.type_url == MULTISIG_PUBKEY_TYPE_URL {
            return Ok(PublicKey::Threshold(ThresholdPublicKey::from_any(any)?));
        }
        Ok(PublicKey::Single(SinglePublicKey::from_any(any)?))
    }

    pub fn as_single(&self) -> Option<&SinglePublicKey> {
        match self {
            PublicKey::Single(key) => Some(key),
            PublicKey::Threshold(_) => None,
        }
    }

    pub fn as_threshold(&self) -> Option<&ThresholdPublicKey> {
        match self {
            PublicKey::Single(_) => None,
            PublicKey::Threshold(key) => Some(key),
        }
    }
}

impl From<SinglePublicKey> for PublicKey {
    fn from(key: SinglePublicKey) -> Self {
        PublicKey::Single(key)
    }
}

impl From<ThresholdPublicKey> for PublicKey {
    fn from(key: ThresholdPublicKey) -> Self {
        PublicKey::Threshold(key)
    }
}

/// Derive the bech32 address of a key under the given network prefix
pub fn derive_address(key: &PublicKey, prefix: &str) -> Result<String, AddressError> {
    key.address().to_bech32(prefix)
}

/// All supported private key types
#[derive(Clone)]
pub enum PrivateKey {
    Secp256k1(Secp256k1PrivKey),
    Ed25519(Ed25519PrivKey),
}

impl PrivateKey {
    /// Generate a fresh secp256k1 key from the OS RNG
    pub fn generate_secp256k1() -> Self {
        PrivateKey::Secp256k1(Secp256k1PrivKey::random(&mut OsRng))
    }

    /// Generate a fresh ed25519 key from the OS RNG
    pub fn generate_ed25519() -> Self {
        PrivateKey::Ed25519(Ed25519PrivKey::generate(&mut OsRng))
    }

    pub fn secp256k1_from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let key = Secp256k1PrivKey::from_slice(bytes)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey::Secp256k1(key))
    }

    pub fn ed25519_from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidPrivateKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(PrivateKey::Ed25519(Ed25519PrivKey::from_bytes(&bytes)))
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> SinglePublicKey {
        match self {
            PrivateKey::Secp256k1(key) => SinglePublicKey::Secp256k1(*key.verifying_key()),
            PrivateKey::Ed25519(key) => SinglePublicKey::Ed25519(key.verifying_key()),
        }
    }
}

// Never print key material
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algo", &self.public_key().algo())
            .field("address", &self.public_key().address())
            .finish()
    }
}

/// JSON shape: `{"type": url, "value": base64}` for single keys,
/// `{"type": url, "threshold": n, "public_keys": [...]}` for threshold keys
#[derive(Serialize, Deserialize)]
struct PublicKeyJson {
    #[serde(rename = "type")]
    key_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    threshold: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    public_keys: Vec<PublicKeyJson>,
}

impl From<&SinglePublicKey> for PublicKeyJson {
    fn from(key: &SinglePublicKey) -> Self {
        Self {
            key_type: key.type_url().to_string(),
            value: Some(general_purpose::STANDARD.encode(key.to_bytes())),
            threshold: None,
            public_keys: Vec::new(),
        }
    }
}

impl From<&PublicKey> for PublicKeyJson {
    fn from(key: &PublicKey) -> Self {
        match key {
            PublicKey::Single(single) => single.into(),
            PublicKey::Threshold(threshold) => Self {
                key_type: MULTISIG_PUBKEY_TYPE_URL.to_string(),
                value: None,
                threshold: Some(threshold.threshold()),
                public_keys: threshold.members().iter().map(Into::into).collect(),
            },
        }
    }
}

impl TryFrom<PublicKeyJson> for SinglePublicKey {
    type Error = KeyError;

    fn try_from(json: PublicKeyJson) -> Result<Self, Self::Error> {
        let value = json.value.ok_or_else(|| KeyError::InvalidPublicKey {
            algo: "single",
            reason: "missing value".to_string(),
        })?;
        let bytes = general_purpose::STANDARD.decode(value)?;
        SinglePublicKey::from_type_and_bytes(&json.key_type, &bytes)
    }
}

impl TryFrom<PublicKeyJson> for PublicKey {
    type Error = KeyError;

    fn try_from(json: PublicKeyJson) -> Result<Self, Self::Error> {
        if json.key_type != MULTISIG_PUBKEY_TYPE_URL {
            return Ok(PublicKey::Single(json.try_into()?));
        }

        let threshold = json.threshold.ok_or(MultisigError::InvalidThreshold {
            threshold: 0,
            members: json.public_keys.len(),
        })?;
        let members = json
            .public_keys
            .into_iter()
            .map(SinglePublicKey::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        // Stored order is part of the key's identity; never re-sort here
        Ok(PublicKey::Threshold(ThresholdPublicKey::from_stored_order(
            threshold, members,
        )?))
    }
}

impl Serialize for SinglePublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        PublicKeyJson::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SinglePublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = PublicKeyJson::deserialize(deserializer)?;
        SinglePublicKey::try_from(json).map_err(serde::de::Error::custom)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        PublicKeyJson::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let json = PublicKeyJson::deserialize(deserializer)?;
        PublicKey::try_from(json).map_err(serde::de::Error::custom)
    }
}
