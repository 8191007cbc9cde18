//! Ethereum JSON-RPC wire types and hex-quantity helpers.
//!
//! Only the fields the explorer actually reads are modelled; unknown
//! fields in node responses are ignored.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors parsing the `0x`-prefixed hex quantities the node returns.
#[derive(Debug, Error)]
pub enum QuantityError {
    #[error("quantity is missing the 0x prefix: {0:?}")]
    MissingPrefix(String),
    #[error("invalid hex quantity {0:?}")]
    InvalidHex(String),
}

/// Parses a JSON-RPC quantity (`"0x1a"`) into a `u64`.
pub fn parse_quantity(s: &str) -> Result<u64, QuantityError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| QuantityError::MissingPrefix(s.to_string()))?;
    u64::from_str_radix(digits, 16).map_err(|_| QuantityError::InvalidHex(s.to_string()))
}

/// Parses a wei amount into a full-width `U256`.
pub fn parse_wei(s: &str) -> Result<U256, QuantityError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| QuantityError::MissingPrefix(s.to_string()))?;
    U256::from_str_radix(digits, 16).map_err(|_| QuantityError::InvalidHex(s.to_string()))
}

/// Encodes a height as a JSON-RPC quantity.
pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}

/// A block as returned by `eth_getBlockByNumber` / `eth_getBlockByHash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub number: String,
    pub hash: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: BlockTransactions,
}

impl Block {
    pub fn height(&self) -> Result<u64, QuantityError> {
        parse_quantity(&self.number)
    }

    pub fn time(&self) -> Result<u64, QuantityError> {
        parse_quantity(&self.timestamp)
    }
}

/// Transactions of a block: hashes only, or full bodies when the block was
/// requested with `full_transactions = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    Hashes(Vec<String>),
    Full(Vec<Transaction>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        BlockTransactions::Hashes(Vec::new())
    }
}

impl BlockTransactions {
    pub fn len(&self) -> usize {
        match self {
            BlockTransactions::Hashes(h) => h.len(),
            BlockTransactions::Full(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transaction hashes regardless of representation.
    pub fn hashes(&self) -> Vec<String> {
        match self {
            BlockTransactions::Hashes(h) => h.clone(),
            BlockTransactions::Full(t) => t.iter().map(|tx| tx.hash.clone()).collect(),
        }
    }

    /// Full bodies. Hash-only entries yield nothing, mirroring how the
    /// indexer skips string entries a node may return despite `full=true`.
    pub fn full(&self) -> &[Transaction] {
        match self {
            BlockTransactions::Hashes(_) => &[],
            BlockTransactions::Full(t) => t,
        }
    }
}

/// A transaction body (`eth_getTransactionByHash` / full block bodies).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    #[serde(default)]
    pub input: Option<String>,
    /// `None` while the transaction is still pending.
    pub block_number: Option<String>,
}

impl Transaction {
    pub fn block_height(&self) -> Result<Option<u64>, QuantityError> {
        self.block_number.as_deref().map(parse_quantity).transpose()
    }
}

/// A transaction receipt. Absent entirely while the transaction is pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: String,
    pub block_number: Option<String>,
    pub status: Option<String>,
    pub gas_used: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

/// An event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
}

/// Filter for `eth_getLogs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    pub from_block: String,
    pub to_block: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Option<String>>>,
}

impl LogFilter {
    /// Filter over a height range with no address or topic constraints.
    pub fn range(from: u64, to: u64) -> Self {
        LogFilter {
            from_block: to_quantity(from),
            to_block: to_quantity(to),
            address: None,
            topics: None,
        }
    }

    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    pub fn topic0(mut self, topic: &str) -> Self {
        self.topics = Some(vec![Some(topic.to_string())]);
        self
    }
}
