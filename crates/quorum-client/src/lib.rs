//! Client library for signing and submitting transactions.
//!
//! This crate coordinates signing sessions (single signers and threshold
//! accounts), talks to a node over Tendermint JSON-RPC to look up accounts
//! and broadcast transactions, and interprets what the node sent back.

pub mod config;
pub mod response;
pub mod session;
pub mod signer;
pub mod tx_builder;

pub use config::ClientConfig;
pub use response::{
    find_attribute, parse_raw_log, AbciMessageLog, Attribute, BroadcastOutcome, StringEvent,
    TxResponse,
};
pub use session::{
    collect_signature, finalize_multisig_tx, sign_direct, sign_single, signer_data_for,
    SessionError,
};
pub use signer::{InMemorySigner, SignerError, TxSigner};
pub use tx_builder::TxBuilder;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use quorum_codec::{Any, MessageExt};
use quorum_crypto::PublicKey;
use reqwest::Client as HttpClient;
use response::BroadcastSyncResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request error
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("json parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// RPC error
    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The application rejected a query
    #[error("abci query failed with code {code}: {log}")]
    Abci { code: u32, log: String },

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The chain has never seen the account, so it has no account number to sign with
    #[error("account not found: {0}")]
    AccountNotFound(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// RPC request
#[derive(Serialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// RPC response
#[derive(Deserialize)]
pub struct RpcResponse<T> {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

/// RPC error
#[derive(Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// On-chain state of an account needed to sign for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: String,
    pub account_number: u64,
    pub sequence: u64,
    /// Absent until the account has signed at least once
    pub pub_key: Option<PublicKey>,
}

/// Operations the signing session needs from a node
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Look up an account; `None` if the chain has never seen it
    async fn account(&self, address: &str) -> Result<Option<AccountInfo>>;

    /// Submit encoded transaction bytes and wait for the mempool check
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<TxResponse>;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Node URL
    pub node_url: Url,
    /// Request timeout
    pub timeout: Duration,
    /// Chain ID
    pub chain_id: String,
}

impl Config {
    /// Create a new configuration
    pub fn new(node_url: &str, chain_id: &str) -> Result<Self> {
        Ok(Self {
            node_url: Url::parse(node_url)?,
            timeout: Duration::from_secs(30),
            chain_id: chain_id.to_string(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl TryFrom<&ClientConfig> for Config {
    type Error = ClientError;

    fn try_from(config: &ClientConfig) -> Result<Self> {
        Ok(Config::new(&config.node, &config.chain_id)?
            .with_timeout(Duration::from_secs(config.timeout)))
    }
}

/// JSON-RPC client for a Tendermint/CometBFT node
pub struct Client {
    config: Config,
    http_client: HttpClient,
}

impl Client {
    /// Create a new client
    pub fn new(config: Config) -> Result<Self> {
        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Make an RPC request
    async fn rpc_request<T>(&self, method: &str, params: serde_json::Value) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: "1".to_string(),
            method: method.to_string(),
            params,
        };

        debug!(method, url = %self.config.node_url, "rpc request");
        let response = self
            .http_client
            .post(self.config.node_url.clone())
            .json(&request)
            .send()
            .await?;

        let rpc_response: RpcResponse<T> = response.json().await?;

        if let Some(error) = rpc_response.error {
            let message = match error.data {
                Some(data) if !data.is_empty() => format!("{}: {data}", error.message),
                _ => error.message,
            };
            return Err(ClientError::Rpc {
                code: error.code,
                message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| ClientError::InvalidResponse("missing result field".to_string()))
    }

    /// Query the application through `abci_query`, returning the raw response value
    pub async fn abci_query(&self, path: &str, data: &[u8]) -> Result<AbciQueryOutcome> {
        let params = serde_json::json!({
            "path": path,
            "data": hex::encode(data),
            "prove": false,
        });
        let result: AbciQueryResult = self.rpc_request("abci_query", params).await?;
        let response = result.response;

        if response.code != 0 {
            return Ok(AbciQueryOutcome::Failed {
                code: response.code,
                log: response.log,
            });
        }

        let value = match response.value {
            Some(value) => general_purpose::STANDARD
                .decode(value)
                .map_err(|e| ClientError::InvalidResponse(format!("abci value: {e}")))?,
            None => Vec::new(),
        };
        Ok(AbciQueryOutcome::Ok(value))
    }
}

#[async_trait]
impl ChainClient for Client {
    async fn account(&self, address: &str) -> Result<Option<AccountInfo>> {
        let request = QueryAccountRequest {
            address: address.to_string(),
        };
        let outcome = self
            .abci_query(QUERY_ACCOUNT_PATH, &quorum_codec::encode(&request))
            .await?;

        match outcome {
            AbciQueryOutcome::Ok(value) => {
                let response: QueryAccountResponse = decode_proto(&value)?;
                let any = response
                    .account
                    .ok_or_else(|| ClientError::InvalidResponse("missing account".to_string()))?;
                Ok(Some(account_from_any(&any)?))
            }
            AbciQueryOutcome::Failed { log, .. } if is_not_found(&log) => Ok(None),
            AbciQueryOutcome::Failed { code, log } => Err(ClientError::Abci { code, log }),
        }
    }

    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<TxResponse> {
        let params = serde_json::json!({
            "tx": general_purpose::STANDARD.encode(tx_bytes)
        });

        let result: BroadcastSyncResult = self.rpc_request("broadcast_tx_sync", params).await?;
        let response = TxResponse::from(result);
        info!(
            txhash = %response.txhash,
            code = response.code,
            "broadcast transaction"
        );
        Ok(response)
    }
}

/// Result of an `abci_query`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbciQueryOutcome {
    Ok(Vec<u8>),
    Failed { code: u32, log: String },
}

#[derive(Deserialize)]
struct AbciQueryResult {
    response: AbciQueryResponse,
}

#[derive(Deserialize)]
struct AbciQueryResponse {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
    #[serde(default)]
    value: Option<String>,
}

const QUERY_ACCOUNT_PATH: &str = "/cosmos.auth.v1beta1.Query/Account";
const BASE_ACCOUNT_TYPE_URL: &str = "/cosmos.auth.v1beta1.BaseAccount";

#[derive(Clone, PartialEq, ::prost::Message)]
struct QueryAccountRequest {
    #[prost(string, tag = "1")]
    address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
struct QueryAccountResponse {
    #[prost(message, optional, tag = "1")]
    account: Option<Any>,
}

/// `cosmos.auth.v1beta1.BaseAccount`
#[derive(Clone, PartialEq, ::prost::Message)]
struct BaseAccountProto {
    #[prost(string, tag = "1")]
    address: String,
    #[prost(message, optional, tag = "2")]
    pub_key: Option<Any>,
    #[prost(uint64, tag = "3")]
    account_number: u64,
    #[prost(uint64, tag = "4")]
    sequence: u64,
}

impl MessageExt for BaseAccountProto {
    const TYPE_URL: &'static str = BASE_ACCOUNT_TYPE_URL;
}

fn decode_proto<M: prost::Message + Default>(bytes: &[u8]) -> Result<M> {
    quorum_codec::decode(bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

fn account_from_any(any: &Any) -> Result<AccountInfo> {
    if any.type_url != BASE_ACCOUNT_TYPE_URL {
        return Err(ClientError::InvalidResponse(format!(
            "unsupported account type {}",
            any.type_url
        )));
    }
    let base: BaseAccountProto = decode_proto(&any.value)?;
    let pub_key = base
        .pub_key
        .as_ref()
        .map(PublicKey::from_any)
        .transpose()
        .map_err(|e| ClientError::InvalidResponse(format!("account public key: {e}")))?;

    Ok(AccountInfo {
        address: base.address,
        account_number: base.account_number,
        sequence: base.sequence,
        pub_key,
    })
}

// The SDK reports unknown accounts as a gRPC NotFound status in the query log
fn is_not_found(log: &str) -> bool {
    log.to_ascii_lowercase().contains("not found")
}
