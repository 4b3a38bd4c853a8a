//! Core types for quorum
//!
//! This crate provides the value types shared across the workspace: account
//! addresses, fees and coins, per-signer chain data, message encodings and
//! fee configuration.

pub mod address;
pub mod config;
pub mod tx;

pub use address::{AccAddress, AddressError, ADDRESS_LEN};
pub use config::{ConfigError, FeeKind, FeeTable, GasPrice};
pub use tx::{AminoMsg, Coin, Fee, RawMsg, SdkMsg, SignerData};
