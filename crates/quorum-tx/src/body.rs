//! Transaction body encoding
//!
//! The body bytes produced here are what every signer commits to (directly
//! in SIGN_MODE_DIRECT, via the same messages in amino JSON) and what the
//! envelope carries verbatim.

use crate::proto::TxBodyProto;
use crate::TxDecodeError;
use quorum_codec::Any;
use quorum_types::SdkMsg;

/// Decoded transaction body
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxBody {
    pub messages: Vec<Any>,
    pub memo: String,
    pub timeout_height: u64,
}

impl TxBody {
    pub fn new<M: SdkMsg>(messages: &[M], memo: impl Into<String>, timeout_height: u64) -> Self {
        Self {
            messages: messages.iter().map(SdkMsg::to_any).collect(),
            memo: memo.into(),
            timeout_height,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        quorum_codec::encode(&TxBodyProto {
            messages: self.messages.clone(),
            memo: self.memo.clone(),
            timeout_height: self.timeout_height,
            extension_options: Vec::new(),
            non_critical_extension_options: Vec::new(),
        })
    }
}

/// Encode messages, memo and timeout into `TxBody` bytes
pub fn encode_body<M: SdkMsg>(messages: &[M], memo: &str, timeout_height: u64) -> Vec<u8> {
    TxBody::new(messages, memo, timeout_height).encode()
}

/// Decode `TxBody` bytes
///
/// Extension options are not supported; a body carrying any is rejected
/// rather than silently dropping them.
pub fn decode_body(bytes: &[u8]) -> Result<TxBody, TxDecodeError> {
    let proto: TxBodyProto = quorum_codec::decode(bytes)?;
    if !proto.extension_options.is_empty() || !proto.non_critical_extension_options.is_empty() {
        return Err(TxDecodeError::Unsupported("tx body extension options"));
    }
    Ok(TxBody {
        messages: proto.messages,
        memo: proto.memo,
        timeout_height: proto.timeout_height,
    })
}
