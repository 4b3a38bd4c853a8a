//! Sign-byte construction
//!
//! LEGACY_AMINO_JSON sign bytes are a canonical JSON `StdSignDoc`; every
//! signer of a multisig round must derive byte-identical output from the same
//! inputs, so nothing here may depend on map iteration order or on the
//! serializer's configured key order.

use crate::proto::SignDocProto;
use quorum_types::{Fee, SdkMsg, SignerData};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TxEncodeError {
    #[error("failed to serialize sign doc: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build LEGACY_AMINO_JSON sign bytes
pub fn build_sign_bytes<M: SdkMsg>(
    messages: &[M],
    fee: &Fee,
    memo: &str,
    signer: &SignerData,
) -> Result<Vec<u8>, TxEncodeError> {
    let msgs = messages
        .iter()
        .map(|msg| serde_json::to_value(msg.to_amino()))
        .collect::<Result<Vec<_>, _>>()?;

    let doc = json!({
        "account_number": signer.account_number.to_string(),
        "chain_id": signer.chain_id,
        "fee": amino_fee(fee),
        "memo": memo,
        "msgs": msgs,
        "sequence": signer.sequence.to_string(),
    });

    let serialized = serde_json::to_string(&canonicalize(doc))?;
    let bytes = escape_html(&serialized).into_bytes();
    debug!(
        chain_id = %signer.chain_id,
        sequence = signer.sequence,
        len = bytes.len(),
        "built amino json sign bytes"
    );
    Ok(bytes)
}

/// Build SIGN_MODE_DIRECT sign bytes
pub fn make_direct_sign_bytes(
    body_bytes: &[u8],
    auth_info_bytes: &[u8],
    chain_id: &str,
    account_number: u64,
) -> Vec<u8> {
    quorum_codec::encode(&SignDocProto {
        body_bytes: body_bytes.to_vec(),
        auth_info_bytes: auth_info_bytes.to_vec(),
        chain_id: chain_id.to_string(),
        account_number,
    })
}

fn amino_fee(fee: &Fee) -> Value {
    let amount: Vec<Value> = fee
        .amount
        .iter()
        .map(|coin| json!({ "amount": coin.amount.to_string(), "denom": coin.denom }))
        .collect();

    let mut out = Map::new();
    out.insert("amount".to_string(), Value::Array(amount));
    out.insert("gas".to_string(), Value::String(fee.gas_limit.to_string()));
    if !fee.granter.is_empty() {
        out.insert("granter".to_string(), Value::String(fee.granter.clone()));
    }
    if !fee.payer.is_empty() {
        out.insert("payer".to_string(), Value::String(fee.payer.clone()));
    }
    Value::Object(out)
}

/// Sort object keys at every depth
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

// Go's encoding/json HTML escaping, which the chain applies before verifying
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("\\u0026"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            c => out.push(c),
        }
    }
    out
}
