//! Transaction value types shared by the encoder and the signing session

use quorum_codec::Any;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single denomination amount
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination, e.g. `ucosm`
    pub denom: String,
    /// Amount in the smallest unit
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Fee information
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// Amount of fee
    pub amount: Vec<Coin>,
    /// Gas limit
    pub gas_limit: u64,
    /// Payer address (bech32), empty when the first signer pays
    #[serde(default)]
    pub payer: String,
    /// Granter address (bech32), empty when no fee grant is used
    #[serde(default)]
    pub granter: String,
}

impl Fee {
    pub fn new(amount: Vec<Coin>, gas_limit: u64) -> Self {
        Self {
            amount,
            gas_limit,
            payer: String::new(),
            granter: String::new(),
        }
    }
}

/// Per-signer chain state consumed by sign-byte construction
///
/// Fetched fresh for every signing attempt. All signers of one multisig round
/// must share the same value, otherwise their sign bytes diverge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerData {
    pub account_number: u64,
    pub sequence: u64,
    pub chain_id: String,
}

impl SignerData {
    pub fn new(account_number: u64, sequence: u64, chain_id: impl Into<String>) -> Self {
        Self {
            account_number,
            sequence,
            chain_id: chain_id.into(),
        }
    }
}

/// Amino JSON form of a message, `{"type": ..., "value": ...}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub value: serde_json::Value,
}

impl AminoMsg {
    pub fn new(msg_type: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            msg_type: msg_type.into(),
            value,
        }
    }
}

/// Contract for every message placed in a transaction body
///
/// A message has two faces: the protobuf `Any` carried in the body bytes and
/// the amino JSON form that legacy sign bytes are computed over.
pub trait SdkMsg: Send + Sync {
    /// Get the Protobuf type URL (e.g., "/cosmos.bank.v1beta1.MsgSend")
    fn type_url(&self) -> &str;

    /// Encode the message to protobuf bytes
    fn encode(&self) -> Vec<u8>;

    /// Amino JSON representation used for LEGACY_AMINO_JSON sign bytes
    fn to_amino(&self) -> AminoMsg;

    /// Wrap the encoded message in an Any
    fn to_any(&self) -> Any {
        Any::new(self.type_url(), self.encode())
    }
}

impl<T: SdkMsg + ?Sized> SdkMsg for Box<T> {
    fn type_url(&self) -> &str {
        (**self).type_url()
    }

    fn encode(&self) -> Vec<u8> {
        (**self).encode()
    }

    fn to_amino(&self) -> AminoMsg {
        (**self).to_amino()
    }

    fn to_any(&self) -> Any {
        (**self).to_any()
    }
}

// Shared between concurrently running signers of one round
impl<T: SdkMsg + ?Sized> SdkMsg for Arc<T> {
    fn type_url(&self) -> &str {
        (**self).type_url()
    }

    fn encode(&self) -> Vec<u8> {
        (**self).encode()
    }

    fn to_amino(&self) -> AminoMsg {
        (**self).to_amino()
    }

    fn to_any(&self) -> Any {
        (**self).to_any()
    }
}

/// A message whose encodings were produced elsewhere
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMsg {
    pub any: Any,
    pub amino: AminoMsg,
}

impl RawMsg {
    pub fn new(any: Any, amino: AminoMsg) -> Self {
        Self { any, amino }
    }
}

impl SdkMsg for RawMsg {
    fn type_url(&self) -> &str {
        &self.any.type_url
    }

    fn encode(&self) -> Vec<u8> {
        self.any.value.clone()
    }

    fn to_amino(&self) -> AminoMsg {
        self.amino.clone()
    }

    fn to_any(&self) -> Any {
        self.any.clone()
    }
}

// Amounts travel as decimal strings in both amino JSON and protobuf
mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coin_serializes_amount_as_string() {
        let coin = Coin::new("ucosm", 5000);
        let value = serde_json::to_value(&coin).unwrap();
        assert_eq!(value, json!({"denom": "ucosm", "amount": "5000"}));

        let back: Coin = serde_json::from_value(value).unwrap();
        assert_eq!(back, coin);
    }

    #[test]
    fn test_coin_rejects_non_numeric_amount() {
        let result: Result<Coin, _> =
            serde_json::from_value(json!({"denom": "ucosm", "amount": "12x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_fee_defaults_payer_and_granter() {
        let fee: Fee = serde_json::from_value(json!({
            "amount": [{"denom": "ucosm", "amount": "1"}],
            "gas_limit": 200000
        }))
        .unwrap();
        assert_eq!(fee, Fee::new(vec![Coin::new("ucosm", 1)], 200_000));
    }

    #[test]
    fn test_raw_msg_faces() {
        let msg = RawMsg::new(
            Any::new("/test.MsgPing", vec![1, 2]),
            AminoMsg::new("test/MsgPing", json!({"n": "1"})),
        );
        assert_eq!(msg.type_url(), "/test.MsgPing");
        assert_eq!(msg.to_any().value, vec![1, 2]);
        assert_eq!(msg.to_amino().msg_type, "test/MsgPing");

        let boxed: Vec<Box<dyn SdkMsg>> = vec![Box::new(msg.clone())];
        assert_eq!(boxed[0].to_any(), msg.any);
    }
}
