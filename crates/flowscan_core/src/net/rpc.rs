use std::time::Duration;

use alloy_primitives::U256;
use reqwest::{Client, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use super::ChainReader;
use crate::types::{Block, Log, LogFilter, QuantityError, Receipt, Transaction, to_quantity};

/// Errors that can occur when talking to an Ethereum JSON-RPC endpoint.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("only http:// and https:// URLs are supported")]
    NonHttpUrl,
    #[error("client error: {0}")]
    Client(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected HTTP status: {0}")]
    Status(StatusCode),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// Default per-call timeout, bounding a stuck iteration of either loop.
const CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Minimal JSON-RPC client for talking to an Ethereum-compatible node over
/// HTTP(S).
///
/// Every method maps to one `eth_*` call; nullable results (`getBlock`,
/// `getTransaction`, `getTransactionReceipt`) surface as `Ok(None)` and
/// callers treat that as "not yet available" rather than "does not exist".
pub struct RpcClient {
    client: Client,
    url: Url,
}

impl RpcClient {
    /// Creates a new client for the given JSON-RPC endpoint.
    ///
    /// `url` should typically look like `http://127.0.0.1:8545` or an HTTPS
    /// endpoint of a hosted node.
    pub fn new(url: &str) -> Result<Self, RpcError> {
        let url = Url::parse(url).map_err(|e| RpcError::Client(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            _ => {
                return Err(RpcError::NonHttpUrl);
            }
        }

        let client = Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;

        Ok(RpcClient { client, url })
    }

    async fn call<T>(&self, method: &str, params: &[Value]) -> Result<T, RpcError>
    where
        T: DeserializeOwned,
    {
        let request_body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let res = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| RpcError::Client(e.to_string()))?;

        if !res.status().is_success() {
            return Err(RpcError::Status(res.status()));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| RpcError::Client(e.to_string()))?;
        let rpc_response: JsonRpcResponse = serde_json::from_slice(&bytes)?;

        if let Some(err) = rpc_response.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        // A missing result is a null result; `T = Option<_>` decodes it.
        let result = rpc_response.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    /// Current head height (`eth_blockNumber`).
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let hex: String = self.call("eth_blockNumber", &[]).await?;
        Ok(crate::types::parse_quantity(&hex)?)
    }

    /// Block at `height` (`eth_getBlockByNumber`), with full transaction
    /// bodies when `full` is set.
    pub async fn block_by_number(&self, height: u64, full: bool) -> Result<Option<Block>, RpcError> {
        self.call("eth_getBlockByNumber", &[json!(to_quantity(height)), json!(full)])
            .await
    }

    /// Block by hash (`eth_getBlockByHash`), with full transaction bodies
    /// when `full` is set.
    pub async fn block_by_hash(&self, hash: &str, full: bool) -> Result<Option<Block>, RpcError> {
        self.call("eth_getBlockByHash", &[json!(hash), json!(full)])
            .await
    }

    /// Transaction body by hash (`eth_getTransactionByHash`).
    pub async fn transaction_by_hash(&self, hash: &str) -> Result<Option<Transaction>, RpcError> {
        self.call("eth_getTransactionByHash", &[json!(hash)]).await
    }

    /// Receipt by transaction hash (`eth_getTransactionReceipt`). Absent
    /// while the transaction is pending.
    pub async fn transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>, RpcError> {
        self.call("eth_getTransactionReceipt", &[json!(hash)]).await
    }

    /// Event logs matching `filter` (`eth_getLogs`).
    pub async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcError> {
        self.call("eth_getLogs", &[serde_json::to_value(filter)?])
            .await
    }

    /// Current gas price in wei (`eth_gasPrice`).
    pub async fn fee_per_gas(&self) -> Result<U256, RpcError> {
        let hex: String = self.call("eth_gasPrice", &[]).await?;
        Ok(crate::types::parse_wei(&hex)?)
    }

    /// Network identifier (`eth_chainId`).
    pub async fn network_id(&self) -> Result<u64, RpcError> {
        let hex: String = self.call("eth_chainId", &[]).await?;
        Ok(crate::types::parse_quantity(&hex)?)
    }
}

impl ChainReader for RpcClient {
    async fn current_height(&self) -> Result<u64, RpcError> {
        self.block_number().await
    }

    async fn get_block(&self, height: u64, full: bool) -> Result<Option<Block>, RpcError> {
        self.block_by_number(height, full).await
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<Transaction>, RpcError> {
        self.transaction_by_hash(hash).await
    }

    async fn gas_price(&self) -> Result<U256, RpcError> {
        self.fee_per_gas().await
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.network_id().await
    }
}
