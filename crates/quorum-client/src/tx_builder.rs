//! Transaction builder for constructing and signing transactions

use crate::session::{self, SessionError};
use crate::signer::TxSigner;
use quorum_crypto::{RawSignature, ThresholdPublicKey};
use quorum_tx::{build_sign_bytes, encode_body, SignedTxEnvelope, TxEncodeError};
use quorum_types::{AccAddress, Fee, FeeKind, FeeTable, GasPrice, SdkMsg, SignerData};
use std::collections::HashMap;
use std::sync::Arc;

/// Collects the parts of a transaction and hands them to a signing session
///
/// Messages are reference counted so the builder can be cloned and shared by
/// concurrently signing members of a multisig round.
///
/// Amino JSON sign bytes do not cover a timeout height, so amino signing
/// (including multisig) always encodes the body without one; the configured
/// timeout height only applies to [`TxBuilder::sign_direct`].
#[derive(Clone, Default)]
pub struct TxBuilder {
    pub messages: Vec<Arc<dyn SdkMsg>>,
    pub memo: String,
    pub timeout_height: u64,
    pub fee: Fee,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the transaction
    pub fn add_message<M: SdkMsg + 'static>(mut self, msg: M) -> Self {
        self.messages.push(Arc::new(msg));
        self
    }

    /// Add multiple messages to the transaction
    pub fn add_messages(mut self, msgs: impl IntoIterator<Item = Arc<dyn SdkMsg>>) -> Self {
        self.messages.extend(msgs);
        self
    }

    pub fn memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn timeout_height(mut self, timeout_height: u64) -> Self {
        self.timeout_height = timeout_height;
        self
    }

    pub fn fee(mut self, fee: Fee) -> Self {
        self.fee = fee;
        self
    }

    /// Pay for `gas_limit` at `gas_price`, keeping any payer or granter already set
    pub fn fee_from_gas_price(mut self, gas_price: &GasPrice, gas_limit: u64) -> Self {
        let fee = gas_price.calculate_fee(gas_limit);
        self.fee.amount = fee.amount;
        self.fee.gas_limit = fee.gas_limit;
        self
    }

    /// Use the configured gas limit for `kind`
    pub fn fee_for(self, table: &FeeTable, kind: FeeKind) -> Self {
        let gas_limit = table.gas_limit(kind);
        self.fee_from_gas_price(&table.gas_price, gas_limit)
    }

    pub fn fee_payer(mut self, payer: impl Into<String>) -> Self {
        self.fee.payer = payer.into();
        self
    }

    pub fn fee_granter(mut self, granter: impl Into<String>) -> Self {
        self.fee.granter = granter.into();
        self
    }

    /// Body bytes for amino JSON signing
    pub fn amino_body_bytes(&self) -> Vec<u8> {
        encode_body(&self.messages, &self.memo, 0)
    }

    /// Amino JSON sign bytes for the given signer data
    pub fn sign_bytes(&self, signer_data: &SignerData) -> Result<Vec<u8>, TxEncodeError> {
        build_sign_bytes(&self.messages, &self.fee, &self.memo, signer_data)
    }

    /// Have one multisig member sign this transaction
    pub async fn collect_signature<S: TxSigner + ?Sized>(
        &self,
        signer: &S,
        signer_data: &SignerData,
    ) -> Result<RawSignature, SessionError> {
        session::collect_signature(
            signer,
            &signer.address(),
            &self.messages,
            &self.fee,
            &self.memo,
            signer_data,
        )
        .await
    }

    /// Aggregate collected member signatures into an envelope
    pub fn finalize_multisig(
        &self,
        threshold_key: &ThresholdPublicKey,
        sequence: u64,
        signatures_by_address: &HashMap<AccAddress, RawSignature>,
    ) -> Result<SignedTxEnvelope, SessionError> {
        session::finalize_multisig_tx(
            threshold_key,
            sequence,
            self.fee.clone(),
            self.amino_body_bytes(),
            signatures_by_address,
        )
    }

    /// Sign with a single key in amino JSON mode
    pub async fn sign_amino<S: TxSigner + ?Sized>(
        &self,
        signer: &S,
        signer_data: &SignerData,
    ) -> Result<SignedTxEnvelope, SessionError> {
        session::sign_single(
            signer,
            &self.messages,
            self.fee.clone(),
            &self.memo,
            signer_data,
        )
        .await
    }

    /// Sign with a single key in direct mode
    pub async fn sign_direct<S: TxSigner + ?Sized>(
        &self,
        signer: &S,
        signer_data: &SignerData,
    ) -> Result<SignedTxEnvelope, SessionError> {
        session::sign_direct(
            signer,
            &self.messages,
            self.fee.clone(),
            &self.memo,
            self.timeout_height,
            signer_data,
        )
        .await
    }
}
