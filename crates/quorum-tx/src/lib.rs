//! Canonical transaction encoding for quorum
//!
//! Builds the bytes signers sign over (amino JSON and direct), the body bytes
//! carried in a transaction, and the protobuf `TxRaw` envelope submitted to
//! the chain.

pub mod body;
pub mod envelope;
pub mod proto;
pub mod sign_doc;

pub use body::{decode_body, encode_body, TxBody};
pub use envelope::{
    auth_info_bytes, build_signed_envelope, decode, encode_for_broadcast, tx_hash, EnvelopeError,
    ModeInfo, SignedTxEnvelope, SignerInfo,
};
pub use proto::SignMode;
pub use sign_doc::{build_sign_bytes, make_direct_sign_bytes, TxEncodeError};

use quorum_codec::ProtobufError;
use quorum_crypto::KeyError;
use thiserror::Error;

/// Transaction decoding error types
///
/// Decoding is all-or-nothing: no partially decoded envelope is ever returned.
#[derive(Error, Debug)]
pub enum TxDecodeError {
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] ProtobufError),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid bit array: {extra_bits_stored} extra bits over {elems} bytes")]
    InvalidBitArray { extra_bits_stored: u32, elems: usize },

    #[error("unknown sign mode: {0}")]
    UnknownSignMode(i32),

    #[error("invalid fee: {0}")]
    InvalidFee(String),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("invalid public key: {0}")]
    PublicKey(#[from] KeyError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}
