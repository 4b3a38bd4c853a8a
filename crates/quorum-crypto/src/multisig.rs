//! Threshold public keys and signature aggregation
//!
//! A threshold key is `k` of `n` single keys. Member order is fixed once, at
//! construction, by ascending compressed key bytes; the bit array and the
//! signature list of an aggregated multisignature are both positional over
//! that order, so it must never change afterwards.

use crate::keys::{KeyError, SinglePublicKey, MULTISIG_PUBKEY_TYPE_URL};
use crate::signature::RawSignature;
use prost::encoding::encode_varint;
use quorum_codec::{Any, MessageExt};
use quorum_types::AccAddress;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

// Amino registered-type prefix for "tendermint/PubKeyMultisigThreshold"
const AMINO_MULTISIG_PREFIX: [u8; 4] = [0x22, 0xc1, 0xf7, 0xe2];

/// Threshold key construction and aggregation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("invalid threshold {threshold} for {members} members")]
    InvalidThreshold { threshold: u32, members: usize },

    #[error("threshold key has no members")]
    EmptyMembers,

    #[error("duplicate threshold key member {0}")]
    DuplicateMember(String),

    #[error("signer {0} is not a member of the threshold key")]
    UnknownSigner(AccAddress),

    #[error("no member signatures to aggregate")]
    NoSignatures,

    #[error("invalid multisignature encoding: {0}")]
    Encoding(String),
}

/// `cosmos.crypto.multisig.LegacyAminoPubKey`
#[derive(Clone, PartialEq, ::prost::Message)]
pub(crate) struct LegacyAminoPubKeyProto {
    #[prost(uint32, tag = "1")]
    pub threshold: u32,
    #[prost(message, repeated, tag = "2")]
    pub public_keys: Vec<Any>,
}

impl MessageExt for LegacyAminoPubKeyProto {
    const TYPE_URL: &'static str = MULTISIG_PUBKEY_TYPE_URL;
}

/// `cosmos.crypto.multisig.v1beta1.MultiSignature`
#[derive(Clone, PartialEq, ::prost::Message)]
struct MultiSignatureProto {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub signatures: Vec<Vec<u8>>,
}

/// A `k`-of-`n` public key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThresholdPublicKey {
    threshold: u32,
    members: Vec<SinglePublicKey>,
}

impl ThresholdPublicKey {
    /// Build a new threshold key, sorting members into canonical order
    pub fn new(mut members: Vec<SinglePublicKey>, threshold: u32) -> Result<Self, MultisigError> {
        members.sort_by_cached_key(|key| key.to_bytes());

        let mut seen = HashSet::with_capacity(members.len());
        for member in &members {
            let bytes = member.to_bytes();
            if !seen.insert(bytes.clone()) {
                return Err(MultisigError::DuplicateMember(hex::encode(bytes)));
            }
        }

        Self::from_stored_order(threshold, members)
    }

    /// Rebuild a key exactly as it was stored, e.g. decoded from an envelope
    ///
    /// Only the threshold bounds are checked. Re-sorting here would change the
    /// key's address and desynchronize any bit array built against it.
    pub fn from_stored_order(
        threshold: u32,
        members: Vec<SinglePublicKey>,
    ) -> Result<Self, MultisigError> {
        if members.is_empty() {
            return Err(MultisigError::EmptyMembers);
        }
        if threshold == 0 || threshold as usize > members.len() {
            return Err(MultisigError::InvalidThreshold {
                threshold,
                members: members.len(),
            });
        }
        Ok(Self { threshold, members })
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Members in canonical order
    pub fn members(&self) -> &[SinglePublicKey] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Addresses of the members, index-aligned with `members()`
    pub fn member_addresses(&self) -> Vec<AccAddress> {
        self.members.iter().map(SinglePublicKey::address).collect()
    }

    /// Position of the member with the given address
    pub fn member_index(&self, address: &AccAddress) -> Option<usize> {
        self.members.iter().position(|m| m.address() == *address)
    }

    /// Amino binary encoding of the whole key
    pub fn amino_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&AMINO_MULTISIG_PREFIX);
        out.push(0x08);
        encode_varint(u64::from(self.threshold), &mut out);
        for member in &self.members {
            let encoded = member.amino_bytes();
            out.push(0x12);
            encode_varint(encoded.len() as u64, &mut out);
            out.extend_from_slice(&encoded);
        }
        out
    }

    /// sha256 of the amino encoding, truncated to 20 bytes
    pub fn address(&self) -> AccAddress {
        AccAddress::from_truncated_sha256(&self.amino_bytes())
    }

    pub fn to_any(&self) -> Any {
        Any::pack(&LegacyAminoPubKeyProto {
            threshold: self.threshold,
            public_keys: self.members.iter().map(SinglePublicKey::to_any).collect(),
        })
    }

    pub fn from_any(any: &Any) -> Result<Self, KeyError> {
        let proto: LegacyAminoPubKeyProto = any.unpack()?;
        let members = proto
            .public_keys
            .iter()
            .map(SinglePublicKey::from_any)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_stored_order(proto.threshold, members)?)
    }
}

/// Create a threshold public key from its members
pub fn create_threshold_public_key(
    members: impl IntoIterator<Item = SinglePublicKey>,
    threshold: u32,
) -> Result<ThresholdPublicKey, MultisigError> {
    ThresholdPublicKey::new(members.into_iter().collect(), threshold)
}

/// Bit array with MSB-first packing, `cosmos.crypto.multisig.v1beta1.CompactBitArray`
#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct CompactBitArray {
    #[prost(uint32, tag = "1")]
    pub extra_bits_stored: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub elems: Vec<u8>,
}

impl CompactBitArray {
    /// All-zero array of `bits` bits
    pub fn with_len(bits: usize) -> Self {
        Self {
            extra_bits_stored: (bits % 8) as u32,
            elems: vec![0u8; bits.div_ceil(8)],
        }
    }

    pub fn len(&self) -> usize {
        if self.extra_bits_stored == 0 {
            self.elems.len() * 8
        } else {
            self.elems.len().saturating_sub(1) * 8 + self.extra_bits_stored as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_index(&self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        self.elems
            .get(index >> 3)
            .is_some_and(|byte| byte & (1 << (7 - (index % 8))) != 0)
    }

    /// Returns false when `index` is out of range
    pub fn set_index(&mut self, index: usize, value: bool) -> bool {
        if index >= self.len() {
            return false;
        }
        let Some(byte) = self.elems.get_mut(index >> 3) else {
            return false;
        };
        let mask = 1u8 << (7 - (index % 8));
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        true
    }

    /// Indices of set bits in ascending order
    pub fn set_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.get_index(i)).collect()
    }

    /// Padding bits past `len` in the last byte are not counted
    pub fn count_set_bits(&self) -> usize {
        let bits = self.len();
        let full = bits / 8;
        let ones: usize = self
            .elems
            .iter()
            .take(full)
            .map(|byte| byte.count_ones() as usize)
            .sum();
        match (bits % 8, self.elems.get(full)) {
            (0, _) | (_, None) => ones,
            (extra, Some(last)) => ones + (last & (0xffu8 << (8 - extra))).count_ones() as usize,
        }
    }

    /// `extra_bits_stored` must be below 8 and, when nonzero, needs a byte to live in
    pub fn is_well_formed(&self) -> bool {
        self.extra_bits_stored < 8 && (self.extra_bits_stored == 0 || !self.elems.is_empty())
    }
}

/// Aggregated signature of a threshold key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultisigSignatureData {
    /// Bit `i` is set iff member `i` contributed a signature
    pub bit_array: CompactBitArray,
    /// One signature per set bit, in ascending member index order
    pub signatures: Vec<Vec<u8>>,
}

impl MultisigSignatureData {
    /// Encode the signature list as a `MultiSignature` for the envelope's signature slot
    pub fn to_bytes(&self) -> Vec<u8> {
        quorum_codec::encode(&MultiSignatureProto {
            signatures: self.signatures.clone(),
        })
    }

    /// Rebuild from a mode-info bit array and the matching signature slot
    pub fn decode(bit_array: CompactBitArray, bytes: &[u8]) -> Result<Self, MultisigError> {
        let proto: MultiSignatureProto =
            quorum_codec::decode(bytes).map_err(|e| MultisigError::Encoding(e.to_string()))?;
        if !bit_array.is_well_formed() {
            return Err(MultisigError::Encoding(format!(
                "bit array with {} extra bits over {} bytes",
                bit_array.extra_bits_stored,
                bit_array.elems.len()
            )));
        }
        let set_bits = bit_array.count_set_bits();
        if set_bits != proto.signatures.len() {
            return Err(MultisigError::Encoding(format!(
                "{set_bits} bits set but {} signatures present",
                proto.signatures.len()
            )));
        }
        Ok(Self {
            bit_array,
            signatures: proto.signatures,
        })
    }

    /// Member indices paired with their signatures
    pub fn signer_signatures(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.bit_array
            .set_indices()
            .into_iter()
            .zip(self.signatures.iter().map(Vec::as_slice))
    }
}

/// Combine per-member signatures into one multisignature
///
/// Signatures are placed by the member order of `key`; the map's iteration
/// order plays no part. Whether enough members signed is left to the
/// verifier.
pub fn aggregate(
    key: &ThresholdPublicKey,
    signatures_by_address: &HashMap<AccAddress, RawSignature>,
) -> Result<MultisigSignatureData, MultisigError> {
    let addresses = key.member_addresses();

    if let Some(unknown) = signatures_by_address
        .keys()
        .filter(|address| !addresses.contains(address))
        .min()
    {
        return Err(MultisigError::UnknownSigner(*unknown));
    }

    let mut bit_array = CompactBitArray::with_len(addresses.len());
    let mut signatures = Vec::with_capacity(signatures_by_address.len());
    for (index, address) in addresses.iter().enumerate() {
        if let Some(raw) = signatures_by_address.get(address) {
            bit_array.set_index(index, true);
            signatures.push(raw.signature.clone());
        }
    }

    if signatures.is_empty() {
        return Err(MultisigError::NoSignatures);
    }

    debug!(
        members = addresses.len(),
        signed = signatures.len(),
        threshold = key.threshold(),
        "aggregated multisignature"
    );

    Ok(MultisigSignatureData {
        bit_array,
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{PrivateKey, PublicKey};
    use proptest::prelude::*;

    fn members(n: u8) -> Vec<SinglePublicKey> {
        (1..=n)
            .map(|seed| {
                PrivateKey::secp256k1_from_bytes(&[seed; 32])
                    .unwrap()
                    .public_key()
            })
            .collect()
    }

    fn raw(key: &SinglePublicKey, tag: u8) -> RawSignature {
        RawSignature::new(key.clone(), vec![tag; 64])
    }

    #[test]
    fn test_members_sorted_by_compressed_bytes() {
        let key = ThresholdPublicKey::new(members(5), 2).unwrap();
        let bytes: Vec<_> = key.members().iter().map(SinglePublicKey::to_bytes).collect();
        let mut sorted = bytes.clone();
        sorted.sort();
        assert_eq!(bytes, sorted);
    }

    #[test]
    fn test_threshold_bounds() {
        assert_eq!(
            ThresholdPublicKey::new(members(3), 0),
            Err(MultisigError::InvalidThreshold {
                threshold: 0,
                members: 3
            })
        );
        assert_eq!(
            ThresholdPublicKey::new(members(3), 4),
            Err(MultisigError::InvalidThreshold {
                threshold: 4,
                members: 3
            })
        );
        assert_eq!(
            ThresholdPublicKey::new(vec![], 1),
            Err(MultisigError::EmptyMembers)
        );
        assert!(ThresholdPublicKey::new(members(3), 3).is_ok());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut keys = members(2);
        keys.push(keys[0].clone());
        assert!(matches!(
            ThresholdPublicKey::new(keys, 2),
            Err(MultisigError::DuplicateMember(_))
        ));
    }

    #[test]
    fn test_amino_layout() {
        let key = ThresholdPublicKey::new(members(2), 2).unwrap();
        let amino = key.amino_bytes();
        assert_eq!(&amino[..4], &AMINO_MULTISIG_PREFIX);
        assert_eq!(&amino[4..6], &[0x08, 0x02]);
        // each member: 0x12, len 38 (4 prefix + 1 len + 33 key)
        assert_eq!(&amino[6..8], &[0x12, 38]);
        assert_eq!(amino.len(), 6 + 2 * (2 + 38));
    }

    #[test]
    fn test_threshold_changes_address() {
        let a = ThresholdPublicKey::new(members(3), 1).unwrap();
        let b = ThresholdPublicKey::new(members(3), 2).unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_any_round_trip_keeps_stored_order() {
        let mut keys = members(3);
        keys.reverse();
        // deliberately out of canonical order
        let stored = ThresholdPublicKey::from_stored_order(2, keys.clone()).unwrap();
        let decoded = ThresholdPublicKey::from_any(&stored.to_any()).unwrap();
        assert_eq!(decoded.members(), keys.as_slice());
        assert_eq!(decoded.address(), stored.address());
    }

    #[test]
    fn test_nested_threshold_rejected() {
        let inner = ThresholdPublicKey::new(members(2), 1).unwrap();
        let outer = LegacyAminoPubKeyProto {
            threshold: 1,
            public_keys: vec![inner.to_any()],
        };
        let result = ThresholdPublicKey::from_any(&Any::pack(&outer));
        assert!(matches!(result, Err(KeyError::NestedThreshold)));
    }

    #[test]
    fn test_bit_array_shape() {
        let mut bits = CompactBitArray::with_len(5);
        assert_eq!(bits.elems.len(), 1);
        assert_eq!(bits.extra_bits_stored, 5);
        assert_eq!(bits.len(), 5);

        assert!(bits.set_index(1, true));
        assert!(bits.set_index(4, true));
        assert!(!bits.set_index(5, true));
        assert_eq!(bits.elems, vec![0b0100_1000]);
        assert_eq!(bits.set_indices(), vec![1, 4]);

        let full = CompactBitArray::with_len(16);
        assert_eq!(full.elems.len(), 2);
        assert_eq!(full.extra_bits_stored, 0);
        assert_eq!(full.len(), 16);
    }

    #[test]
    fn test_bit_array_count_ignores_padding() {
        let bits = CompactBitArray {
            extra_bits_stored: 3,
            elems: vec![0xff, 0b1011_1111],
        };
        assert_eq!(bits.len(), 11);
        assert_eq!(bits.count_set_bits(), 10);
        assert_eq!(bits.count_set_bits(), bits.set_indices().len());
    }

    #[test]
    fn test_bit_array_well_formed() {
        assert!(CompactBitArray::with_len(0).is_well_formed());
        assert!(CompactBitArray::with_len(13).is_well_formed());

        let oversized = CompactBitArray {
            extra_bits_stored: u32::MAX,
            elems: vec![0xc0],
        };
        assert!(!oversized.is_well_formed());
        let dangling = CompactBitArray {
            extra_bits_stored: 2,
            elems: vec![],
        };
        assert!(!dangling.is_well_formed());

        // Two signatures match the two set bits of 0xc0
        let bytes = MultisigSignatureData {
            bit_array: CompactBitArray::with_len(3),
            signatures: vec![vec![1u8; 64], vec![2u8; 64]],
        }
        .to_bytes();
        let result = MultisigSignatureData::decode(oversized, &bytes);
        assert!(matches!(result, Err(MultisigError::Encoding(_))));
    }

    #[test]
    fn test_aggregate_two_of_five() {
        let key = ThresholdPublicKey::new(members(5), 2).unwrap();
        let m = key.members();
        let map = HashMap::from([
            (m[3].address(), raw(&m[3], 3)),
            (m[1].address(), raw(&m[1], 1)),
        ]);

        let data = aggregate(&key, &map).unwrap();
        assert_eq!(data.bit_array.set_indices(), vec![1, 3]);
        assert_eq!(data.signatures, vec![vec![1u8; 64], vec![3u8; 64]]);
    }

    #[test]
    fn test_aggregate_unknown_signer() {
        let key = ThresholdPublicKey::new(members(3), 2).unwrap();
        let outsider = PrivateKey::secp256k1_from_bytes(&[99u8; 32])
            .unwrap()
            .public_key();
        let map = HashMap::from([
            (key.members()[0].address(), raw(&key.members()[0], 0)),
            (outsider.address(), raw(&outsider, 9)),
        ]);

        assert_eq!(
            aggregate(&key, &map),
            Err(MultisigError::UnknownSigner(outsider.address()))
        );
    }

    #[test]
    fn test_aggregate_empty() {
        let key = ThresholdPublicKey::new(members(3), 1).unwrap();
        assert_eq!(
            aggregate(&key, &HashMap::new()),
            Err(MultisigError::NoSignatures)
        );
    }

    #[test]
    fn test_aggregate_below_threshold_is_allowed() {
        let key = ThresholdPublicKey::new(members(4), 3).unwrap();
        let m = &key.members()[2];
        let map = HashMap::from([(m.address(), raw(m, 2))]);
        let data = aggregate(&key, &map).unwrap();
        assert_eq!(data.bit_array.count_set_bits(), 1);
    }

    #[test]
    fn test_signature_data_decode() {
        let key = ThresholdPublicKey::new(members(3), 2).unwrap();
        let m = key.members();
        let map = HashMap::from([
            (m[0].address(), raw(&m[0], 10)),
            (m[2].address(), raw(&m[2], 12)),
        ]);
        let data = aggregate(&key, &map).unwrap();

        let decoded = MultisigSignatureData::decode(data.bit_array.clone(), &data.to_bytes()).unwrap();
        assert_eq!(decoded, data);
        let pairs: Vec<_> = decoded.signer_signatures().map(|(i, s)| (i, s[0])).collect();
        assert_eq!(pairs, vec![(0, 10), (2, 12)]);

        let mismatch = MultisigSignatureData::decode(CompactBitArray::with_len(3), &data.to_bytes());
        assert!(matches!(mismatch, Err(MultisigError::Encoding(_))));
    }

    #[test]
    fn test_public_key_dispatch() {
        let key = ThresholdPublicKey::new(members(2), 1).unwrap();
        let wrapped = PublicKey::from(key.clone());
        assert_eq!(wrapped.address(), key.address());
        assert_eq!(wrapped.type_url(), MULTISIG_PUBKEY_TYPE_URL);
    }

    proptest! {
        #[test]
        fn prop_construction_is_order_independent(
            perm in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle(),
            threshold in 1u32..=5,
        ) {
            let base = members(5);
            let shuffled: Vec<_> = perm.iter().map(|&i| base[i].clone()).collect();
            let a = ThresholdPublicKey::new(base, threshold).unwrap();
            let b = ThresholdPublicKey::new(shuffled, threshold).unwrap();
            prop_assert_eq!(a.address(), b.address());
            prop_assert_eq!(a.members(), b.members());
        }

        #[test]
        fn prop_aggregate_places_by_member_index(mask in 1u8..32) {
            let key = ThresholdPublicKey::new(members(5), 1).unwrap();
            let chosen: Vec<usize> = (0..5).filter(|i| mask & (1 << i) != 0).collect();
            let map: HashMap<_, _> = chosen
                .iter()
                .map(|&i| {
                    let m = &key.members()[i];
                    (m.address(), raw(m, i as u8))
                })
                .collect();

            let data = aggregate(&key, &map).unwrap();
            prop_assert_eq!(data.bit_array.len(), 5);
            prop_assert_eq!(data.bit_array.set_indices(), chosen.clone());
            let tags: Vec<u8> = data.signatures.iter().map(|s| s[0]).collect();
            let expected: Vec<u8> = chosen.iter().map(|&i| i as u8).collect();
            prop_assert_eq!(tags, expected);
        }

        #[test]
        fn prop_bit_array_len(bits in 0usize..200) {
            let array = CompactBitArray::with_len(bits);
            prop_assert_eq!(array.len(), bits);
            prop_assert_eq!(array.elems.len(), bits.div_ceil(8));
        }

        #[test]
        fn prop_count_set_bits_matches_indices(
            bits in 1usize..64,
            elems in proptest::collection::vec(any::<u8>(), 8),
        ) {
            let mut array = CompactBitArray::with_len(bits);
            let used = array.elems.len();
            array.elems.copy_from_slice(&elems[..used]);
            prop_assert_eq!(array.count_set_bits(), array.set_indices().len());
        }
    }
}
