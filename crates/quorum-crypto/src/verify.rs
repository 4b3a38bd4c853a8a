//! Local signature verification
//!
//! Mirrors the checks the remote verifier runs on a signer's signature slot,
//! so a client can reject a bad multisignature before broadcasting it. This
//! is the only place the threshold itself is enforced.

use crate::keys::SinglePublicKey;
use crate::multisig::{MultisigSignatureData, ThresholdPublicKey};
use crate::signature::verify_signature;
use quorum_types::AccAddress;
use thiserror::Error;

/// Errors that can occur during signature verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("bit array covers {actual} members, threshold key has {expected}")]
    BitArraySizeMismatch { expected: usize, actual: usize },

    #[error("{set_bits} bits set but {signatures} signatures present")]
    SignatureCountMismatch { set_bits: usize, signatures: usize },

    #[error("threshold not met: {have} of {need} required signatures")]
    ThresholdNotMet { have: usize, need: usize },

    #[error("signature verification failed for address: {0}")]
    SignatureVerificationFailed(AccAddress),
}

/// Verify a single signer's signature over `sign_bytes`
pub fn verify_single(
    key: &SinglePublicKey,
    sign_bytes: &[u8],
    signature: &[u8],
) -> Result<(), VerificationError> {
    verify_signature(key, sign_bytes, signature)
        .map_err(|_| VerificationError::SignatureVerificationFailed(key.address()))
}

/// Verify an aggregated multisignature against its threshold key
///
/// Every member signature is checked over the same `sign_bytes`; all members
/// of one round sign identical bytes.
pub fn verify_multisignature(
    key: &ThresholdPublicKey,
    data: &MultisigSignatureData,
    sign_bytes: &[u8],
) -> Result<(), VerificationError> {
    if data.bit_array.len() != key.member_count() {
        return Err(VerificationError::BitArraySizeMismatch {
            expected: key.member_count(),
            actual: data.bit_array.len(),
        });
    }

    let set_bits = data.bit_array.count_set_bits();
    if set_bits != data.signatures.len() {
        return Err(VerificationError::SignatureCountMismatch {
            set_bits,
            signatures: data.signatures.len(),
        });
    }

    let need = key.threshold() as usize;
    if set_bits < need {
        return Err(VerificationError::ThresholdNotMet {
            have: set_bits,
            need,
        });
    }

    for (index, signature) in data.signer_signatures() {
        verify_single(&key.members()[index], sign_bytes, signature)?;
    }

    Ok(())
}
