//! Broadcast result interpretation
//!
//! A node answering a broadcast is not the same as the transaction being
//! accepted. Remote rejection is reported as a value, never as an error, and
//! the node's raw log is kept untouched for diagnosis.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Event attribute
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Event with string attributes, as found in structured logs
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Structured log of one message in a transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciMessageLog {
    #[serde(default)]
    pub msg_index: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<StringEvent>,
}

/// Node response to a broadcast
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    /// Zero until the transaction is included in a block
    pub height: u64,
    pub txhash: String,
    pub codespace: String,
    /// Zero means accepted
    pub code: u32,
    pub raw_log: String,
    pub logs: Vec<AbciMessageLog>,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Interpreted result of a broadcast
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Accepted {
        txhash: String,
        height: u64,
        logs: Vec<AbciMessageLog>,
    },
    Rejected {
        txhash: String,
        code: u32,
        codespace: String,
        raw_log: String,
    },
}

impl BroadcastOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BroadcastOutcome::Accepted { .. })
    }

    pub fn txhash(&self) -> &str {
        match self {
            BroadcastOutcome::Accepted { txhash, .. } | BroadcastOutcome::Rejected { txhash, .. } => {
                txhash
            }
        }
    }
}

impl TxResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    /// Classify the response as accepted or rejected
    pub fn outcome(&self) -> BroadcastOutcome {
        if self.is_ok() {
            return BroadcastOutcome::Accepted {
                txhash: self.txhash.clone(),
                height: self.height,
                logs: self.logs.clone(),
            };
        }

        warn!(
            txhash = %self.txhash,
            code = self.code,
            codespace = %self.codespace,
            "transaction rejected"
        );
        BroadcastOutcome::Rejected {
            txhash: self.txhash.clone(),
            code: self.code,
            codespace: self.codespace.clone(),
            raw_log: self.raw_log.clone(),
        }
    }
}

/// `broadcast_tx_sync` result as returned over JSON-RPC
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BroadcastSyncResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub log: String,
    pub hash: String,
}

impl From<BroadcastSyncResult> for TxResponse {
    fn from(result: BroadcastSyncResult) -> Self {
        let logs = parse_raw_log(&result.log);
        TxResponse {
            height: 0,
            txhash: result.hash,
            codespace: result.codespace,
            code: result.code,
            raw_log: result.log,
            logs,
            gas_wanted: 0,
            gas_used: 0,
        }
    }
}

/// Extract structured logs from a raw log
///
/// Failed transactions carry a plain-text raw log; that yields no structured
/// logs rather than an error.
pub fn parse_raw_log(raw_log: &str) -> Vec<AbciMessageLog> {
    serde_json::from_str(raw_log).unwrap_or_default()
}

/// Value of the first attribute `key` on an event of type `event_type`
pub fn find_attribute<'a>(
    logs: &'a [AbciMessageLog],
    event_type: &str,
    key: &str,
) -> Option<&'a str> {
    logs.iter()
        .flat_map(|log| log.events.iter())
        .filter(|event| event.event_type == event_type)
        .flat_map(|event| event.attributes.iter())
        .find(|attr| attr.key == key)
        .map(|attr| attr.value.as_str())
}
