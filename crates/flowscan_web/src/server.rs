//! The JSON query surface.
//!
//! Every endpoint answers a `{"success": …}` envelope; failures are
//! reported in-band rather than as opaque 5xx responses. The transaction
//! detail endpoint mirrors the explorer page semantics: a short retry
//! window for just-broadcast hashes and an explicit "pending" status for
//! mined-but-unreceipted transactions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use flowscan_core::net::RpcClient;
use flowscan_core::record::TxRecord;
use flowscan_core::retry::RetryPolicy;
use flowscan_core::store::{SqliteStore, TxStore};
use flowscan_core::types::{Block, Log, LogFilter, Receipt, Transaction};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::live::LiveView;

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b067fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// How far back the on-demand token transfer lookup reaches.
const TOKEN_LOG_RANGE: u64 = 5_000;

/// Maximum records an address query returns.
const ADDRESS_QUERY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub chain: Arc<RpcClient>,
    pub live: Arc<RwLock<Option<LiveView>>>,
    pub lookup: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn fail(message: impl Into<String>) -> Json<Self> {
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TxDetail {
    /// "pending" (mined but no receipt yet, or not yet mined), "success"
    /// or "failed".
    status: &'static str,
    tx: Transaction,
    receipt: Option<Receipt>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/live", get(live_view))
        .route("/api/address/{addr}", get(address_transactions))
        .route("/api/block/{id}", get(block_detail))
        .route("/api/tx/{hash}", get(transaction_detail))
        .route("/api/token/{addr}/transfers", get(token_transfers))
        .with_state(state)
}

/// Latest published poll snapshot.
async fn live_view(State(st): State<AppState>) -> Json<ApiResponse<LiveView>> {
    match st.live.read().await.clone() {
        Some(view) => ApiResponse::ok(view),
        None => ApiResponse::fail("live view not ready"),
    }
}

/// Up to 100 stored records where the address is sender or recipient,
/// newest block first.
async fn address_transactions(
    State(st): State<AppState>,
    Path(addr): Path<String>,
) -> Json<ApiResponse<Vec<TxRecord>>> {
    match st.store.by_address(&addr, ADDRESS_QUERY_LIMIT) {
        Ok(txs) => ApiResponse::ok(txs),
        Err(e) => ApiResponse::fail(e.to_string()),
    }
}

#[derive(Debug)]
enum BlockSelector {
    Number(u64),
    Hash(String),
}

/// A `0x`-prefixed identifier is a block hash, anything else must be a
/// decimal height.
fn block_selector(id: &str) -> Option<BlockSelector> {
    if id.starts_with("0x") {
        return Some(BlockSelector::Hash(id.to_lowercase()));
    }
    id.parse().ok().map(BlockSelector::Number)
}

/// Block detail straight from the node, by height or by hash, with full
/// transaction bodies.
async fn block_detail(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<Block>> {
    let fetched = match block_selector(&id) {
        Some(BlockSelector::Number(n)) => st.chain.block_by_number(n, true).await,
        Some(BlockSelector::Hash(h)) => st.chain.block_by_hash(&h, true).await,
        None => return ApiResponse::fail("invalid block identifier"),
    };
    match fetched {
        Ok(Some(block)) => ApiResponse::ok(block),
        Ok(None) => ApiResponse::fail("block not found"),
        Err(e) => ApiResponse::fail(e.to_string()),
    }
}

/// Transaction detail straight from the node.
async fn transaction_detail(
    State(st): State<AppState>,
    Path(hash): Path<String>,
) -> Json<ApiResponse<TxDetail>> {
    let chain = &st.chain;

    let tx = match st
        .lookup
        .run_until_some(|| chain.transaction_by_hash(&hash))
        .await
    {
        Ok(Some(tx)) => tx,
        Ok(None) => return ApiResponse::fail("transaction not found"),
        Err(e) => return ApiResponse::fail(e.to_string()),
    };

    // Not yet mined: no point polling for a receipt.
    if tx.block_number.is_none() {
        return ApiResponse::ok(TxDetail {
            status: "pending",
            tx,
            receipt: None,
        });
    }

    // Mined but unreceipted is a valid in-flight state, not an error.
    let receipt = match st
        .lookup
        .run_until_some(|| chain.transaction_receipt(&hash))
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(hash = %hash, error = %e, "receipt lookup failed; reporting pending");
            None
        }
    };

    let status = match &receipt {
        Some(r) => receipt_status(r),
        None => "pending",
    };
    ApiResponse::ok(TxDetail {
        status,
        tx,
        receipt,
    })
}

fn receipt_status(receipt: &Receipt) -> &'static str {
    match receipt.status.as_deref() {
        Some("0x0") => "failed",
        _ => "success",
    }
}

/// Recent ERC-20 Transfer logs for a token contract, fetched from the node
/// on demand. Token activity is not indexed.
async fn token_transfers(
    State(st): State<AppState>,
    Path(addr): Path<String>,
) -> Json<ApiResponse<Vec<Log>>> {
    let head = match st.chain.block_number().await {
        Ok(h) => h,
        Err(e) => return ApiResponse::fail(e.to_string()),
    };
    let filter = transfer_filter(&addr, head);
    match st.chain.logs(&filter).await {
        Ok(logs) => ApiResponse::ok(logs),
        Err(e) => ApiResponse::fail(e.to_string()),
    }
}

fn transfer_filter(token: &str, head: u64) -> LogFilter {
    LogFilter::range(head.saturating_sub(TOKEN_LOG_RANGE), head)
        .address(&token.to_lowercase())
        .topic0(TRANSFER_TOPIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shapes() {
        let ok = ApiResponse::ok(vec![1, 2, 3]);
        let v = serde_json::to_value(&ok.0).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["data"], serde_json::json!([1, 2, 3]));
        assert!(v.get("error").is_none());

        let fail: Json<ApiResponse<()>> = ApiResponse::fail("boom");
        let v = serde_json::to_value(&fail.0).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "boom");
        assert!(v.get("data").is_none());
    }

    #[test]
    fn receipt_status_mapping() {
        let mut receipt = Receipt {
            transaction_hash: "0x1".to_string(),
            block_number: Some("0x10".to_string()),
            status: Some("0x1".to_string()),
            gas_used: None,
            logs: Vec::new(),
        };
        assert_eq!(receipt_status(&receipt), "success");
        receipt.status = Some("0x0".to_string());
        assert_eq!(receipt_status(&receipt), "failed");
        receipt.status = None;
        assert_eq!(receipt_status(&receipt), "success");
    }

    #[test]
    fn transfer_topic_is_the_canonical_event_hash() {
        // 0x plus 32 bytes of hex, spelled out so a typo in the constant
        // cannot hide behind a self-referential assertion.
        assert_eq!(TRANSFER_TOPIC.len(), 66);
        assert_eq!(
            TRANSFER_TOPIC,
            "0xddf252ad1be2c89b69c2b067fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn transfer_filter_targets_token_and_topic() {
        let f = transfer_filter("0xDEADbeef", 10_000);
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["address"], "0xdeadbeef");
        assert_eq!(
            v["topics"][0],
            "0xddf252ad1be2c89b69c2b067fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(v["fromBlock"], "0x1388"); // 5000
        assert_eq!(v["toBlock"], "0x2710"); // 10000
    }

    #[test]
    fn block_identifier_dispatch() {
        assert!(matches!(
            block_selector("1234"),
            Some(BlockSelector::Number(1234))
        ));
        let hash = "0xAbC0000000000000000000000000000000000000000000000000000000000def";
        match block_selector(hash) {
            Some(BlockSelector::Hash(h)) => assert_eq!(h, hash.to_lowercase()),
            other => panic!("expected hash dispatch, got {other:?}"),
        }
        assert!(block_selector("latest").is_none());
        assert!(block_selector("-5").is_none());
    }
}
