//! Signing sessions
//!
//! A multisig round runs in two phases. Each member independently builds the
//! same amino JSON sign bytes and signs them through its [`TxSigner`]; those
//! calls share nothing and may run concurrently. Once the caller has joined
//! them, [`finalize_multisig_tx`] aggregates the signatures into one envelope.
//!
//! Every member of a round must be given the same [`SignerData`], or their
//! signatures will cover different bytes and the aggregate will not verify.

use crate::signer::TxSigner;
use crate::{ChainClient, ClientError};
use quorum_crypto::{aggregate, MultisigError, RawSignature, ThresholdPublicKey};
use quorum_tx::{
    auth_info_bytes, build_sign_bytes, build_signed_envelope, encode_body, make_direct_sign_bytes,
    EnvelopeError, ModeInfo, SignMode, SignedTxEnvelope, SignerInfo, TxEncodeError,
};
use quorum_types::{AccAddress, Fee, SdkMsg, SignerData};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("signer {signer} failed to sign: {reason}")]
    SigningFailed { signer: AccAddress, reason: String },

    #[error("signer key belongs to {actual}, expected {expected}")]
    SignerMismatch {
        expected: AccAddress,
        actual: AccAddress,
    },

    #[error(transparent)]
    Multisig(#[from] MultisigError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Encode(#[from] TxEncodeError),
}

/// Have one member sign the amino JSON sign bytes of a transaction
///
/// The capability is called exactly once. Nothing is retried.
pub async fn collect_signature<S, M>(
    signer: &S,
    signer_address: &AccAddress,
    messages: &[M],
    fee: &Fee,
    memo: &str,
    signer_data: &SignerData,
) -> Result<RawSignature, SessionError>
where
    S: TxSigner + ?Sized,
    M: SdkMsg,
{
    let public_key = signer.public_key();
    let actual = public_key.address();
    if actual != *signer_address {
        return Err(SessionError::SignerMismatch {
            expected: *signer_address,
            actual,
        });
    }

    let sign_bytes = build_sign_bytes(messages, fee, memo, signer_data)?;
    let signature = signer
        .sign(&sign_bytes)
        .await
        .map_err(|e| SessionError::SigningFailed {
            signer: *signer_address,
            reason: e.to_string(),
        })?;

    debug!(signer = %signer_address, "collected signature");
    Ok(RawSignature::new(public_key, signature))
}

/// Aggregate member signatures into a broadcast-ready envelope
///
/// The envelope has exactly one signer info (the threshold key with a multi
/// mode info whose bit array marks the contributing members) and one
/// signature slot holding the encoded multisignature. Whether enough members
/// signed is decided by the chain.
pub fn finalize_multisig_tx(
    threshold_key: &ThresholdPublicKey,
    sequence: u64,
    fee: Fee,
    body_bytes: Vec<u8>,
    signatures_by_address: &HashMap<AccAddress, RawSignature>,
) -> Result<SignedTxEnvelope, SessionError> {
    let data = aggregate(threshold_key, signatures_by_address)?;

    let signer_info = SignerInfo::new(
        threshold_key.clone(),
        ModeInfo::multi(data.bit_array.clone(), SignMode::LegacyAminoJson),
        sequence,
    );
    let envelope = build_signed_envelope(body_bytes, fee, vec![signer_info], vec![data.to_bytes()])?;

    info!(
        multisig = %threshold_key.address(),
        signers = data.signatures.len(),
        threshold = threshold_key.threshold(),
        sequence,
        "finalized multisig transaction"
    );
    Ok(envelope)
}

/// Sign a transaction with a single key in amino JSON mode
pub async fn sign_single<S, M>(
    signer: &S,
    messages: &[M],
    fee: Fee,
    memo: &str,
    signer_data: &SignerData,
) -> Result<SignedTxEnvelope, SessionError>
where
    S: TxSigner + ?Sized,
    M: SdkMsg,
{
    let address = signer.address();
    let raw = collect_signature(signer, &address, messages, &fee, memo, signer_data).await?;

    let signer_info = SignerInfo::new(
        raw.public_key,
        ModeInfo::Single(SignMode::LegacyAminoJson),
        signer_data.sequence,
    );
    let body_bytes = encode_body(messages, memo, 0);
    Ok(build_signed_envelope(
        body_bytes,
        fee,
        vec![signer_info],
        vec![raw.signature],
    )?)
}

/// Sign a transaction with a single key in direct mode
///
/// The signature covers the exact body and auth info bytes placed in the
/// envelope, so the timeout height is honored here.
pub async fn sign_direct<S, M>(
    signer: &S,
    messages: &[M],
    fee: Fee,
    memo: &str,
    timeout_height: u64,
    signer_data: &SignerData,
) -> Result<SignedTxEnvelope, SessionError>
where
    S: TxSigner + ?Sized,
    M: SdkMsg,
{
    let address = signer.address();
    let body_bytes = encode_body(messages, memo, timeout_height);
    let signer_info = SignerInfo::new(
        signer.public_key(),
        ModeInfo::Single(SignMode::Direct),
        signer_data.sequence,
    );
    let auth_info = auth_info_bytes(std::slice::from_ref(&signer_info), &fee);
    let sign_bytes = make_direct_sign_bytes(
        &body_bytes,
        &auth_info,
        &signer_data.chain_id,
        signer_data.account_number,
    );

    let signature = signer
        .sign(&sign_bytes)
        .await
        .map_err(|e| SessionError::SigningFailed {
            signer: address,
            reason: e.to_string(),
        })?;

    Ok(build_signed_envelope(
        body_bytes,
        fee,
        vec![signer_info],
        vec![signature],
    )?)
}

/// Fetch the account number and sequence to sign with
///
/// An account the chain has never seen has no account number; that is a hard
/// failure, not a default of zero.
pub async fn signer_data_for<C>(
    client: &C,
    address: &str,
    chain_id: &str,
) -> Result<SignerData, ClientError>
where
    C: ChainClient + ?Sized,
{
    let account = client
        .account(address)
        .await?
        .ok_or_else(|| ClientError::AccountNotFound(address.to_string()))?;

    Ok(SignerData::new(
        account.account_number,
        account.sequence,
        chain_id,
    ))
}
