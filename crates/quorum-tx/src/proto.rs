//! Protobuf wire types for `cosmos.tx.v1beta1`

use prost::Message;
use quorum_codec::Any;
use quorum_crypto::CompactBitArray;
use quorum_types::{Coin, Fee};

/// `TxRaw`: body and auth info kept as the exact bytes that were signed
#[derive(Clone, PartialEq, Message)]
pub struct TxRawProto {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxBodyProto {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
    #[prost(message, repeated, tag = "1023")]
    pub extension_options: Vec<Any>,
    #[prost(message, repeated, tag = "2047")]
    pub non_critical_extension_options: Vec<Any>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuthInfoProto {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfoProto>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<FeeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignerInfoProto {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfoProto>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModeInfoProto {
    #[prost(oneof = "mode_info_proto::Sum", tags = "1, 2")]
    pub sum: Option<mode_info_proto::Sum>,
}

/// Nested module for mode info variants
pub mod mode_info_proto {
    use super::{ModeInfoMultiProto, ModeInfoSingleProto};

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Sum {
        #[prost(message, tag = "1")]
        Single(ModeInfoSingleProto),
        #[prost(message, tag = "2")]
        Multi(ModeInfoMultiProto),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ModeInfoSingleProto {
    #[prost(enumeration = "SignMode", tag = "1")]
    pub mode: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModeInfoMultiProto {
    #[prost(message, optional, tag = "1")]
    pub bitarray: Option<CompactBitArray>,
    #[prost(message, repeated, tag = "2")]
    pub mode_infos: Vec<ModeInfoProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct FeeProto {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<CoinProto>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct CoinProto {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

/// `SignDoc` signed over in SIGN_MODE_DIRECT
#[derive(Clone, PartialEq, Message)]
pub struct SignDocProto {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

/// Sign mode enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SignMode {
    Unspecified = 0,
    Direct = 1,
    Textual = 2,
    DirectAux = 3,
    LegacyAminoJson = 127,
}

impl From<&Coin> for CoinProto {
    fn from(coin: &Coin) -> Self {
        Self {
            denom: coin.denom.clone(),
            amount: coin.amount.to_string(),
        }
    }
}

impl TryFrom<CoinProto> for Coin {
    type Error = std::num::ParseIntError;

    fn try_from(proto: CoinProto) -> Result<Self, Self::Error> {
        Ok(Coin::new(proto.denom, proto.amount.parse()?))
    }
}

impl From<&Fee> for FeeProto {
    fn from(fee: &Fee) -> Self {
        Self {
            amount: fee.amount.iter().map(CoinProto::from).collect(),
            gas_limit: fee.gas_limit,
            payer: fee.payer.clone(),
            granter: fee.granter.clone(),
        }
    }
}

impl TryFrom<FeeProto> for Fee {
    type Error = std::num::ParseIntError;

    fn try_from(proto: FeeProto) -> Result<Self, Self::Error> {
        let amount = proto
            .amount
            .into_iter()
            .map(Coin::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fee {
            amount,
            gas_limit: proto.gas_limit,
            payer: proto.payer,
            granter: proto.granter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_mode_values() {
        assert_eq!(SignMode::LegacyAminoJson as i32, 127);
        assert_eq!(SignMode::try_from(1), Ok(SignMode::Direct));
        assert!(SignMode::try_from(42).is_err());
    }

    #[test]
    fn test_fee_proto_round_trip() {
        let mut fee = Fee::new(vec![Coin::new("ucosm", 340_282_366_920_938_463_463)], 200_000);
        fee.granter = "cosmos1granter".to_string();

        let proto = FeeProto::from(&fee);
        assert_eq!(proto.amount[0].amount, "340282366920938463463");
        assert_eq!(Fee::try_from(proto).unwrap(), fee);
    }

    #[test]
    fn test_fee_proto_rejects_bad_amount() {
        let proto = FeeProto {
            amount: vec![CoinProto {
                denom: "ucosm".to_string(),
                amount: "1.5".to_string(),
            }],
            ..Default::default()
        };
        assert!(Fee::try_from(proto).is_err());
    }
}
