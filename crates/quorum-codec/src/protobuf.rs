//! Protobuf encoding/decoding for Cosmos SDK style messages
//!
//! Every polymorphic field on the wire (messages, public keys) is carried as a
//! `google.protobuf.Any`. The helpers here keep the type URL next to the bytes
//! and make encoding infallible where prost allows it.

use prost::{DecodeError, Message};
use thiserror::Error;

/// Protobuf encoding/decoding errors
#[derive(Error, Debug)]
pub enum ProtobufError {
    /// Decoding failed
    #[error("failed to decode protobuf: {0}")]
    DecodeError(#[from] DecodeError),

    /// Message type mismatch
    #[error("message type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

/// Result type for protobuf operations
pub type Result<T> = std::result::Result<T, ProtobufError>;

/// Cosmos SDK Any type implementation
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Any {
    /// Type URL in the form `/fully.qualified.protobuf.Name`
    #[prost(string, tag = "1")]
    pub type_url: String,

    /// Binary serialization of the protobuf message
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

impl Any {
    /// Create an Any from raw parts
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Create a new Any from a message and type URL
    pub fn from_msg<M: Message>(msg: &M, type_url: impl Into<String>) -> Self {
        Self {
            type_url: type_url.into(),
            value: msg.encode_to_vec(),
        }
    }

    /// Pack a message into an Any using its registered type URL
    pub fn pack<M: MessageExt>(msg: &M) -> Self {
        Self::from_msg(msg, M::TYPE_URL)
    }

    /// Unpack an Any into a specific message type, checking the type URL first
    pub fn unpack<M: MessageExt + Default>(&self) -> Result<M> {
        if !self.is::<M>() {
            return Err(ProtobufError::TypeMismatch {
                expected: M::TYPE_URL.to_string(),
                actual: self.type_url.clone(),
            });
        }
        M::decode(self.value.as_slice()).map_err(ProtobufError::from)
    }

    /// Check if this Any contains a message of the given type
    pub fn is<M: MessageExt>(&self) -> bool {
        self.type_url == M::TYPE_URL
    }
}

/// Extension trait for messages with type URL support
pub trait MessageExt: Message {
    /// The type URL for this message type
    const TYPE_URL: &'static str;

    /// Get the type URL for this message
    fn type_url(&self) -> &'static str {
        Self::TYPE_URL
    }
}

/// Encode any prost message into a fresh buffer
pub fn encode<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_to_vec()
}

/// Decode protobuf bytes into a message
pub fn decode<M: Message + Default>(data: &[u8]) -> Result<M> {
    M::decode(data).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, ::prost::Message)]
    struct TestKey {
        #[prost(bytes = "vec", tag = "1")]
        pub key: Vec<u8>,
    }

    impl MessageExt for TestKey {
        const TYPE_URL: &'static str = "/test.TestKey";
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    struct OtherKey {
        #[prost(bytes = "vec", tag = "1")]
        pub key: Vec<u8>,
    }

    impl MessageExt for OtherKey {
        const TYPE_URL: &'static str = "/test.OtherKey";
    }

    #[test]
    fn test_any_pack_unpack() {
        let msg = TestKey { key: vec![2u8; 33] };

        let any = Any::pack(&msg);
        assert_eq!(any.type_url, "/test.TestKey");
        assert!(any.is::<TestKey>());

        let unpacked: TestKey = any.unpack().unwrap();
        assert_eq!(unpacked, msg);
    }

    #[test]
    fn test_unpack_rejects_wrong_type_url() {
        let any = Any::pack(&TestKey { key: vec![1, 2, 3] });

        let result = any.unpack::<OtherKey>();
        assert!(matches!(
            result,
            Err(ProtobufError::TypeMismatch { ref expected, .. }) if expected == "/test.OtherKey"
        ));
    }

    #[test]
    fn test_decode_garbage_fails() {
        // field 1, wire type 2, length 10, but only one byte follows
        let result = decode::<TestKey>(&[0x0a, 0x0a, 0x01]);
        assert!(matches!(result, Err(ProtobufError::DecodeError(_))));
    }

    #[test]
    fn test_any_encoding_is_stable() {
        let any = Any::new("/a", vec![0xff]);
        assert_eq!(encode(&any), vec![0x0a, 0x02, b'/', b'a', 0x12, 0x01, 0xff]);
    }
}
