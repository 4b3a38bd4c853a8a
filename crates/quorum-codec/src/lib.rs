//! Encoding and decoding utilities for quorum transactions.
//!
//! This crate provides the protobuf `Any` wrapper and the `MessageExt`
//! trait that tie a prost message to its Cosmos SDK type URL.

pub mod protobuf;

pub use protobuf::{decode, encode, Any, MessageExt, ProtobufError};
