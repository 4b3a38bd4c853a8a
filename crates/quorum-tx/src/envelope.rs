//! Signed transaction envelope
//!
//! An envelope pairs each signer info with exactly one signature slot. For a
//! threshold account the slot holds the encoded `MultiSignature` and the
//! signer info carries the bit array saying which members filled it.

use crate::body::{decode_body, TxBody};
use crate::proto::{
    mode_info_proto, AuthInfoProto, FeeProto, ModeInfoMultiProto, ModeInfoProto,
    ModeInfoSingleProto, SignMode, SignerInfoProto, TxRawProto,
};
use crate::TxDecodeError;
use quorum_crypto::{CompactBitArray, MultisigError, MultisigSignatureData, PublicKey};
use quorum_types::Fee;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed envelope: {signer_infos} signer infos but {signatures} signatures")]
    MalformedEnvelope {
        signer_infos: usize,
        signatures: usize,
    },
}

/// How a signer's slot was signed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModeInfo {
    Single(SignMode),
    Multi {
        bitarray: CompactBitArray,
        mode_infos: Vec<ModeInfo>,
    },
}

impl ModeInfo {
    /// Mode info for a threshold signer whose members all signed in `mode`
    pub fn multi(bitarray: CompactBitArray, mode: SignMode) -> Self {
        let signers = bitarray.count_set_bits();
        ModeInfo::Multi {
            bitarray,
            mode_infos: vec![ModeInfo::Single(mode); signers],
        }
    }

    fn to_proto(&self) -> ModeInfoProto {
        let sum = match self {
            ModeInfo::Single(mode) => mode_info_proto::Sum::Single(ModeInfoSingleProto {
                mode: *mode as i32,
            }),
            ModeInfo::Multi {
                bitarray,
                mode_infos,
            } => mode_info_proto::Sum::Multi(ModeInfoMultiProto {
                bitarray: Some(bitarray.clone()),
                mode_infos: mode_infos.iter().map(ModeInfo::to_proto).collect(),
            }),
        };
        ModeInfoProto { sum: Some(sum) }
    }

    fn from_proto(proto: ModeInfoProto) -> Result<Self, TxDecodeError> {
        match proto.sum.ok_or(TxDecodeError::MissingField("mode_info.sum"))? {
            mode_info_proto::Sum::Single(single) => {
                let mode = SignMode::try_from(single.mode)
                    .map_err(|_| TxDecodeError::UnknownSignMode(single.mode))?;
                Ok(ModeInfo::Single(mode))
            }
            mode_info_proto::Sum::Multi(multi) => {
                let bitarray = multi
                    .bitarray
                    .ok_or(TxDecodeError::MissingField("mode_info.multi.bitarray"))?;
                if !bitarray.is_well_formed() {
                    return Err(TxDecodeError::InvalidBitArray {
                        extra_bits_stored: bitarray.extra_bits_stored,
                        elems: bitarray.elems.len(),
                    });
                }
                Ok(ModeInfo::Multi {
                    bitarray,
                    mode_infos: multi
                        .mode_infos
                        .into_iter()
                        .map(ModeInfo::from_proto)
                        .collect::<Result<_, _>>()?,
                })
            }
        }
    }
}

/// Who signed a slot and how
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerInfo {
    pub public_key: PublicKey,
    pub mode_info: ModeInfo,
    pub sequence: u64,
}

impl SignerInfo {
    pub fn new(public_key: impl Into<PublicKey>, mode_info: ModeInfo, sequence: u64) -> Self {
        Self {
            public_key: public_key.into(),
            mode_info,
            sequence,
        }
    }

    fn to_proto(&self) -> SignerInfoProto {
        SignerInfoProto {
            public_key: Some(self.public_key.to_any()),
            mode_info: Some(self.mode_info.to_proto()),
            sequence: self.sequence,
        }
    }

    fn from_proto(proto: SignerInfoProto) -> Result<Self, TxDecodeError> {
        let any = proto
            .public_key
            .ok_or(TxDecodeError::MissingField("signer_info.public_key"))?;
        let mode_info = proto
            .mode_info
            .ok_or(TxDecodeError::MissingField("signer_info.mode_info"))?;
        Ok(Self {
            public_key: PublicKey::from_any(&any)?,
            mode_info: ModeInfo::from_proto(mode_info)?,
            sequence: proto.sequence,
        })
    }
}

/// A fully signed transaction, immutable once built
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTxEnvelope {
    body_bytes: Vec<u8>,
    fee: Fee,
    signer_infos: Vec<SignerInfo>,
    signatures: Vec<Vec<u8>>,
}

impl SignedTxEnvelope {
    pub fn body_bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn fee(&self) -> &Fee {
        &self.fee
    }

    pub fn signer_infos(&self) -> &[SignerInfo] {
        &self.signer_infos
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// Decode the carried body bytes
    pub fn body(&self) -> Result<TxBody, TxDecodeError> {
        decode_body(&self.body_bytes)
    }

    /// `AuthInfo` bytes as they appear on the wire
    pub fn auth_info_bytes(&self) -> Vec<u8> {
        auth_info_bytes(&self.signer_infos, &self.fee)
    }

    /// Decode the multisignature in slot `index`, if that signer is a threshold signer
    pub fn multisig_data(
        &self,
        index: usize,
    ) -> Option<Result<MultisigSignatureData, MultisigError>> {
        let info = self.signer_infos.get(index)?;
        let ModeInfo::Multi { bitarray, .. } = &info.mode_info else {
            return None;
        };
        let slot = self.signatures.get(index)?;
        Some(MultisigSignatureData::decode(bitarray.clone(), slot))
    }
}

/// Encode `AuthInfo { signer_infos, fee }`
pub fn auth_info_bytes(signer_infos: &[SignerInfo], fee: &Fee) -> Vec<u8> {
    quorum_codec::encode(&AuthInfoProto {
        signer_infos: signer_infos.iter().map(SignerInfo::to_proto).collect(),
        fee: Some(FeeProto::from(fee)),
    })
}

/// Assemble an envelope, checking only that every signer has one slot
pub fn build_signed_envelope(
    body_bytes: Vec<u8>,
    fee: Fee,
    signer_infos: Vec<SignerInfo>,
    signatures: Vec<Vec<u8>>,
) -> Result<SignedTxEnvelope, EnvelopeError> {
    if signer_infos.len() != signatures.len() {
        return Err(EnvelopeError::MalformedEnvelope {
            signer_infos: signer_infos.len(),
            signatures: signatures.len(),
        });
    }
    Ok(SignedTxEnvelope {
        body_bytes,
        fee,
        signer_infos,
        signatures,
    })
}

/// Serialize to `TxRaw` bytes for broadcast
pub fn encode_for_broadcast(envelope: &SignedTxEnvelope) -> Vec<u8> {
    quorum_codec::encode(&TxRawProto {
        body_bytes: envelope.body_bytes.clone(),
        auth_info_bytes: envelope.auth_info_bytes(),
        signatures: envelope.signatures.clone(),
    })
}

/// Parse `TxRaw` bytes back into an envelope
pub fn decode(bytes: &[u8]) -> Result<SignedTxEnvelope, TxDecodeError> {
    let raw: TxRawProto = quorum_codec::decode(bytes)?;
    let auth_info: AuthInfoProto = quorum_codec::decode(&raw.auth_info_bytes)?;

    let fee = auth_info.fee.ok_or(TxDecodeError::MissingField("auth_info.fee"))?;
    let fee = Fee::try_from(fee).map_err(|e| TxDecodeError::InvalidFee(e.to_string()))?;

    let signer_infos = auth_info
        .signer_infos
        .into_iter()
        .map(SignerInfo::from_proto)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(build_signed_envelope(
        raw.body_bytes,
        fee,
        signer_infos,
        raw.signatures,
    )?)
}

/// Transaction hash as reported by the chain: upper-case hex sha256 of the tx bytes
pub fn tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(tx_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use quorum_crypto::{aggregate, PrivateKey, RawSignature, ThresholdPublicKey};
    use quorum_types::Coin;
    use std::collections::HashMap;

    fn single_info(seed: u8, sequence: u64) -> SignerInfo {
        let key = PrivateKey::secp256k1_from_bytes(&[seed; 32])
            .unwrap()
            .public_key();
        SignerInfo::new(key, ModeInfo::Single(SignMode::Direct), sequence)
    }

    fn multisig_envelope() -> SignedTxEnvelope {
        let members: Vec<_> = (1..=3u8)
            .map(|s| PrivateKey::secp256k1_from_bytes(&[s; 32]).unwrap().public_key())
            .collect();
        let key = ThresholdPublicKey::new(members, 2).unwrap();
        let map: HashMap<_, _> = [0usize, 2]
            .iter()
            .map(|&i| {
                let m = &key.members()[i];
                (m.address(), RawSignature::new(m.clone(), vec![i as u8; 64]))
            })
            .collect();
        let data = aggregate(&key, &map).unwrap();

        let info = SignerInfo::new(
            key,
            ModeInfo::multi(data.bit_array.clone(), SignMode::LegacyAminoJson),
            4,
        );
        build_signed_envelope(
            vec![0x0a, 0x00],
            Fee::new(vec![Coin::new("ucosm", 5000)], 200_000),
            vec![info],
            vec![data.to_bytes()],
        )
        .unwrap()
    }

    #[test]
    fn test_mismatched_slots_rejected() {
        let result = build_signed_envelope(
            vec![],
            Fee::default(),
            vec![single_info(1, 0), single_info(2, 0)],
            vec![vec![0u8; 64]],
        );
        assert_eq!(
            result,
            Err(EnvelopeError::MalformedEnvelope {
                signer_infos: 2,
                signatures: 1
            })
        );
    }

    #[test]
    fn test_single_round_trip() {
        let envelope = build_signed_envelope(
            vec![1, 2, 3],
            Fee::new(vec![Coin::new("uatom", 1)], 100),
            vec![single_info(1, 9)],
            vec![vec![7u8; 64]],
        )
        .unwrap();

        let bytes = encode_for_broadcast(&envelope);
        assert_eq!(decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn test_multisig_round_trip() {
        let envelope = multisig_envelope();
        let decoded = decode(&encode_for_broadcast(&envelope)).unwrap();
        assert_eq!(decoded, envelope);

        let data = decoded.multisig_data(0).unwrap().unwrap();
        assert_eq!(data.bit_array.set_indices(), vec![0, 2]);
        assert_eq!(data.signatures, vec![vec![0u8; 64], vec![2u8; 64]]);

        let ModeInfo::Multi { mode_infos, .. } = &decoded.signer_infos()[0].mode_info else {
            panic!("expected multi mode info");
        };
        assert_eq!(mode_infos, &vec![ModeInfo::Single(SignMode::LegacyAminoJson); 2]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let envelope = multisig_envelope();
        assert_eq!(encode_for_broadcast(&envelope), encode_for_broadcast(&envelope.clone()));
    }

    #[test]
    fn test_decode_missing_public_key() {
        let auth_info = AuthInfoProto {
            signer_infos: vec![SignerInfoProto {
                public_key: None,
                mode_info: Some(ModeInfo::Single(SignMode::Direct).to_proto()),
                sequence: 0,
            }],
            fee: Some(FeeProto::default()),
        };
        let raw = TxRawProto {
            body_bytes: vec![],
            auth_info_bytes: quorum_codec::encode(&auth_info),
            signatures: vec![vec![]],
        };
        let result = decode(&quorum_codec::encode(&raw));
        assert!(matches!(
            result,
            Err(TxDecodeError::MissingField("signer_info.public_key"))
        ));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode(&[0xff, 0xff, 0xff]),
            Err(TxDecodeError::Protobuf(_))
        ));
    }

    #[test]
    fn test_decode_slot_mismatch() {
        let raw = TxRawProto {
            body_bytes: vec![],
            auth_info_bytes: auth_info_bytes(&[single_info(1, 0)], &Fee::default()),
            signatures: vec![],
        };
        let result = decode(&quorum_codec::encode(&raw));
        assert!(matches!(
            result,
            Err(TxDecodeError::Envelope(EnvelopeError::MalformedEnvelope { .. }))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_bit_array() {
        let members: Vec<_> = (1..=3u8)
            .map(|s| PrivateKey::secp256k1_from_bytes(&[s; 32]).unwrap().public_key())
            .collect();
        let key = ThresholdPublicKey::new(members, 2).unwrap();
        let bitarray = CompactBitArray {
            extra_bits_stored: u32::MAX,
            elems: vec![0xc0],
        };
        let info = SignerInfo::new(key, ModeInfo::multi(bitarray, SignMode::Direct), 0);
        let raw = TxRawProto {
            body_bytes: vec![],
            auth_info_bytes: auth_info_bytes(&[info], &Fee::default()),
            signatures: vec![vec![]],
        };

        let result = decode(&quorum_codec::encode(&raw));
        assert!(matches!(
            result,
            Err(TxDecodeError::InvalidBitArray {
                extra_bits_stored: u32::MAX,
                elems: 1
            })
        ));
    }

    #[test]
    fn test_tx_hash_format() {
        let hash = tx_hash(b"");
        assert_eq!(
            hash,
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    fn sign_mode() -> impl Strategy<Value = SignMode> {
        prop_oneof![Just(SignMode::Direct), Just(SignMode::LegacyAminoJson)]
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            singles in proptest::collection::vec((1u8..=200, any::<u64>(), sign_mode()), 0..4),
            multi in proptest::option::of((1u8..8, any::<u64>(), sign_mode())),
            body_bytes in proptest::collection::vec(any::<u8>(), 0..64),
            coins in proptest::collection::vec(("[a-z]{3,8}", any::<u128>()), 0..3),
            gas_limit in any::<u64>(),
            payer in "(cosmos1[a-z0-9]{10})?",
            granter in "(cosmos1[a-z0-9]{10})?",
            signature_len in 0usize..80,
        ) {
            let mut signer_infos = Vec::new();
            let mut signatures = Vec::new();
            for (seed, sequence, mode) in singles {
                let key = PrivateKey::secp256k1_from_bytes(&[seed; 32]).unwrap().public_key();
                signer_infos.push(SignerInfo::new(key, ModeInfo::Single(mode), sequence));
                signatures.push(vec![seed; signature_len]);
            }
            if let Some((mask, sequence, mode)) = multi {
                let members: Vec<_> = (201..=203u8)
                    .map(|s| PrivateKey::secp256k1_from_bytes(&[s; 32]).unwrap().public_key())
                    .collect();
                let key = ThresholdPublicKey::new(members, 2).unwrap();
                let mut bitarray = CompactBitArray::with_len(3);
                let mut member_sigs = Vec::new();
                for index in 0..3usize {
                    if mask & (1 << index) != 0 {
                        bitarray.set_index(index, true);
                        member_sigs.push(vec![index as u8; signature_len]);
                    }
                }
                let data = MultisigSignatureData {
                    bit_array: bitarray.clone(),
                    signatures: member_sigs,
                };
                signer_infos.push(SignerInfo::new(key, ModeInfo::multi(bitarray, mode), sequence));
                signatures.push(data.to_bytes());
            }

            let mut fee = Fee::new(
                coins.into_iter().map(|(denom, amount)| Coin::new(denom, amount)).collect(),
                gas_limit,
            );
            fee.payer = payer;
            fee.granter = granter;

            let envelope = build_signed_envelope(body_bytes, fee, signer_infos, signatures).unwrap();
            let bytes = encode_for_broadcast(&envelope);
            prop_assert_eq!(decode(&bytes).unwrap(), envelope);
        }
    }
}
