//! File formats exchanged between the members of a multisig round

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use quorum_client::TxBuilder;
use quorum_codec::Any;
use quorum_crypto::{PublicKey, RawSignature, SinglePublicKey, ThresholdPublicKey};
use quorum_tx::{ModeInfo, SignedTxEnvelope};
use quorum_types::{AccAddress, AminoMsg, Fee, RawMsg, SignerData};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

/// A message with both of its encodings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFile {
    pub type_url: String,
    /// Base64 protobuf encoding
    pub value: String,
    pub amino: AminoMsg,
}

impl MessageFile {
    fn to_raw_msg(&self) -> Result<RawMsg> {
        let value = general_purpose::STANDARD
            .decode(&self.value)
            .with_context(|| format!("message {} has invalid base64 value", self.type_url))?;
        Ok(RawMsg::new(
            Any::new(self.type_url.clone(), value),
            self.amino.clone(),
        ))
    }
}

/// Transaction every member of a round signs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub messages: Vec<MessageFile>,
    #[serde(default)]
    pub memo: String,
    pub fee: Fee,
    /// Account number and sequence of the multisig account
    pub signer: SignerData,
    /// Threshold key of the multisig account
    pub multisig: PublicKey,
}

impl UnsignedTx {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse unsigned transaction {}", path.display()))
    }

    pub fn threshold_key(&self) -> Result<&ThresholdPublicKey> {
        self.multisig
            .as_threshold()
            .ok_or_else(|| anyhow!("multisig key is not a threshold key"))
    }

    pub fn builder(&self) -> Result<TxBuilder> {
        if self.messages.is_empty() {
            bail!("transaction has no messages");
        }
        let mut builder = TxBuilder::new().memo(self.memo.clone()).fee(self.fee.clone());
        for message in &self.messages {
            builder = builder.add_message(message.to_raw_msg()?);
        }
        Ok(builder)
    }
}

/// Read member signature files, rejecting two files from the same member
pub fn load_signatures(paths: &[impl AsRef<Path>]) -> Result<HashMap<AccAddress, RawSignature>> {
    let mut signatures = HashMap::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let raw: RawSignature = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse signature {}", path.display()))?;

        let address = raw.address();
        if signatures.insert(address, raw).is_some() {
            bail!("duplicate signature from {address}");
        }
    }
    Ok(signatures)
}

/// Parse a member public key given as hex or base64
///
/// 33 bytes is a compressed secp256k1 key, 32 bytes an ed25519 key.
pub fn parse_member_key(input: &str) -> Result<SinglePublicKey> {
    let bytes = hex::decode(input)
        .or_else(|_| general_purpose::STANDARD.decode(input))
        .map_err(|_| anyhow!("public key {input} is neither hex nor base64"))?;

    let key = match bytes.len() {
        33 => SinglePublicKey::from_secp256k1_bytes(&bytes)?,
        32 => SinglePublicKey::from_ed25519_bytes(&bytes)?,
        n => bail!("public key {input} has unsupported length {n}"),
    };
    Ok(key)
}

/// JSON view of a decoded envelope
pub fn envelope_view(envelope: &SignedTxEnvelope, txhash: &str, prefix: &str) -> Result<Value> {
    let body = envelope.body()?;
    let messages: Vec<Value> = body
        .messages
        .iter()
        .map(|any| {
            json!({
                "type_url": any.type_url,
                "value": general_purpose::STANDARD.encode(&any.value),
            })
        })
        .collect();

    let mut signer_infos = Vec::with_capacity(envelope.signer_infos().len());
    for info in envelope.signer_infos() {
        signer_infos.push(json!({
            "address": info.public_key.address().to_bech32(prefix)?,
            "public_key": info.public_key,
            "mode_info": mode_info_view(&info.mode_info),
            "sequence": info.sequence.to_string(),
        }));
    }

    let signatures: Vec<String> = envelope
        .signatures()
        .iter()
        .map(|sig| general_purpose::STANDARD.encode(sig))
        .collect();

    Ok(json!({
        "txhash": txhash,
        "body": {
            "messages": messages,
            "memo": body.memo,
            "timeout_height": body.timeout_height.to_string(),
        },
        "fee": envelope.fee(),
        "signer_infos": signer_infos,
        "signatures": signatures,
    }))
}

fn mode_info_view(mode_info: &ModeInfo) -> Value {
    match mode_info {
        ModeInfo::Single(mode) => json!({ "single": format!("{mode:?}") }),
        ModeInfo::Multi {
            bitarray,
            mode_infos,
        } => {
            // Same rendering the chain uses: x for a signer, _ otherwise
            let bits: String = (0..bitarray.len())
                .map(|i| if bitarray.get_index(i) { 'x' } else { '_' })
                .collect();
            json!({
                "multi": {
                    "bitarray": bits,
                    "mode_infos": mode_infos.iter().map(mode_info_view).collect::<Vec<_>>(),
                }
            })
        }
    }
}
