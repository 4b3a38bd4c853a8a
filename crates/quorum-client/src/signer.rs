//! Signing capability
//!
//! Anything that can hold a key and sign bytes (an in-process key, a hardware
//! wallet, a remote signer) implements [`TxSigner`]. The session never sees
//! private key material.

use async_trait::async_trait;
use quorum_crypto::{sign_message, KeyError, PrivateKey, SignatureError, SinglePublicKey};
use quorum_types::AccAddress;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignerError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("signing request rejected: {0}")]
    Rejected(String),
}

/// A capability that signs arbitrary bytes with one single-signer key
#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Public key of the signing key
    fn public_key(&self) -> SinglePublicKey;

    fn address(&self) -> AccAddress {
        self.public_key().address()
    }

    /// Sign `sign_bytes`, returning the raw signature
    async fn sign(&self, sign_bytes: &[u8]) -> Result<Vec<u8>, SignerError>;
}

/// Signer backed by a private key held in memory
#[derive(Clone)]
pub struct InMemorySigner {
    key: PrivateKey,
    public_key: SinglePublicKey,
}

impl InMemorySigner {
    pub fn new(key: PrivateKey) -> Self {
        let public_key = key.public_key();
        Self { key, public_key }
    }

    pub fn from_secp256k1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self::new(PrivateKey::secp256k1_from_bytes(bytes)?))
    }

    pub fn from_ed25519_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self::new(PrivateKey::ed25519_from_bytes(bytes)?))
    }
}

impl fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("address", &self.public_key.address())
            .finish()
    }
}

#[async_trait]
impl TxSigner for InMemorySigner {
    fn public_key(&self) -> SinglePublicKey {
        self.public_key.clone()
    }

    async fn sign(&self, sign_bytes: &[u8]) -> Result<Vec<u8>, SignerError> {
        Ok(sign_message(&self.key, sign_bytes)?)
    }
}
