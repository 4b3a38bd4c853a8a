//! Cryptographic primitives for quorum
//!
//! Single-signer keys, threshold keys and their amino/protobuf encodings,
//! signing and verification, and aggregation of member signatures into a
//! multisignature.

pub mod keys;
pub mod multisig;
pub mod signature;
pub mod verify;

pub use keys::{
    derive_address, KeyError, PrivateKey, PublicKey, SinglePublicKey, ED25519_PUBKEY_TYPE_URL,
    MULTISIG_PUBKEY_TYPE_URL, SECP256K1_PUBKEY_TYPE_URL,
};
pub use multisig::{
    aggregate, create_threshold_public_key, CompactBitArray, MultisigError,
    MultisigSignatureData, ThresholdPublicKey,
};
pub use signature::{sign_message, verify_signature, RawSignature, SignatureError};
pub use verify::{verify_multisignature, verify_single, VerificationError};
