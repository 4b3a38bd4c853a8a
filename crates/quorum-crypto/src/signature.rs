//! Signature operations

use crate::keys::{PrivateKey, SinglePublicKey};
use quorum_types::AccAddress;
use serde::{Deserialize, Serialize};
use signature::{Signer, Verifier};
use thiserror::Error;

/// Length of a compact secp256k1 or ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("malformed {algo} signature: {reason}")]
    Malformed { algo: &'static str, reason: String },

    #[error("verification failed")]
    VerificationFailed,
}

/// One signer's signature over sign bytes, with the key that produced it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub public_key: SinglePublicKey,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl RawSignature {
    pub fn new(public_key: SinglePublicKey, signature: Vec<u8>) -> Self {
        Self {
            public_key,
            signature,
        }
    }

    /// Address of the signing key
    pub fn address(&self) -> AccAddress {
        self.public_key.address()
    }

    pub fn verify(&self, message: &[u8]) -> Result<(), SignatureError> {
        verify_signature(&self.public_key, message, &self.signature)
    }
}

/// Sign a message with a private key
///
/// secp256k1 signatures are 64-byte `r || s` over sha256(message) with a
/// low `s`; ed25519 signatures are the standard 64 bytes.
pub fn sign_message(key: &PrivateKey, message: &[u8]) -> Result<Vec<u8>, SignatureError> {
    match key {
        PrivateKey::Secp256k1(k) => {
            use k256::ecdsa::Signature;
            let sig: Signature = k
                .try_sign(message)
                .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
            let sig = sig.normalize_s().unwrap_or(sig);
            Ok(sig.to_bytes().to_vec())
        }
        PrivateKey::Ed25519(k) => {
            use ed25519_dalek::Signature;
            let sig: Signature = k
                .try_sign(message)
                .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;
            Ok(sig.to_bytes().to_vec())
        }
    }
}

/// Verify a signature with a public key
pub fn verify_signature(
    key: &SinglePublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    match key {
        SinglePublicKey::Secp256k1(k) => {
            use k256::ecdsa::Signature;
            let sig = Signature::from_slice(signature).map_err(|e| SignatureError::Malformed {
                algo: "secp256k1",
                reason: e.to_string(),
            })?;
            // high-s signatures are not accepted by the chain
            if sig.normalize_s().is_some() {
                return Err(SignatureError::VerificationFailed);
            }
            k.verify(message, &sig)
                .map_err(|_| SignatureError::VerificationFailed)
        }
        SinglePublicKey::Ed25519(k) => {
            use ed25519_dalek::Signature;
            let sig = Signature::from_slice(signature).map_err(|e| SignatureError::Malformed {
                algo: "ed25519",
                reason: e.to_string(),
            })?;
            k.verify(message, &sig)
                .map_err(|_| SignatureError::VerificationFailed)
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}
