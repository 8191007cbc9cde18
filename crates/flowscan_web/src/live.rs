//! The live forward poller: a bounded, de-duplicated rolling window of the
//! freshest transactions and blocks near the chain head.
//!
//! Each tick is a function of the previous [`LiveState`] and a chain
//! snapshot; the loop in [`run_live`] awaits ticks sequentially, so a slow
//! pass can never overlap the next one. The history-digging heuristic is
//! deliberately lossy: the pointer resets toward the head whenever the
//! live blocks alone fill the window, and blocks passed over that way are
//! never revisited.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::utils::format_ether;
use flowscan_core::net::{ChainReader, RpcError};
use flowscan_core::types::{Block, QuantityError, Transaction, parse_wei};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Tunables of the live window: poll every 5 s, show 6 blocks, dig
/// 10-block chunks whenever fewer than 6 transactions are in sight, cap
/// the list at 30.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub interval: Duration,
    /// How many head blocks feed the "latest blocks" display.
    pub display_blocks: u64,
    /// Dig into history when the live blocks yield at most this many txs.
    pub tx_sufficiency: usize,
    /// How many blocks one history dig covers.
    pub dig_chunk: u64,
    /// Upper bound of the rendered transaction list.
    pub display_cap: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            interval: Duration::from_secs(5),
            display_blocks: 6,
            tx_sufficiency: 5,
            dig_chunk: 10,
            display_cap: 30,
        }
    }
}

/// Poller-private state carried from tick to tick. Rebuilt from nothing on
/// restart; never persisted.
#[derive(Debug, Default)]
pub struct LiveState {
    /// Every hash ever rendered, so a transaction is shown at most once.
    seen: HashSet<String>,
    /// Current display list, newest block first, at most `display_cap`.
    txs: Vec<LiveTx>,
    /// Where the next history dig starts. Only ever moves backward except
    /// for the forward reset when the live window is full enough.
    history_pointer: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub height: u64,
    /// Current gas price in wei, decimal string.
    pub gas_price: String,
    pub chain_id: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub number: u64,
    pub hash: Option<String>,
    pub timestamp: u64,
    pub tx_count: usize,
}

impl BlockSummary {
    fn from_wire(block: &Block) -> Result<Self, QuantityError> {
        Ok(BlockSummary {
            number: block.height()?,
            hash: block.hash.clone(),
            timestamp: block.time()?,
            tx_count: block.transactions.len(),
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LiveTx {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    /// Ether-denominated decimal string.
    pub value: String,
    /// 0 while the transaction is pending, so pending entries sort last.
    pub block: u64,
}

impl LiveTx {
    fn from_wire(tx: &Transaction) -> Result<Self, QuantityError> {
        Ok(LiveTx {
            hash: tx.hash.clone(),
            from: tx.from.to_lowercase(),
            to: tx.to.as_ref().map(|t| t.to_lowercase()),
            value: format_ether(parse_wei(&tx.value)?),
            block: tx.block_height()?.unwrap_or(0),
        })
    }
}

/// One publishable snapshot of the live window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    pub stats: NetworkStats,
    pub blocks: Vec<BlockSummary>,
    pub txs: Vec<LiveTx>,
}

/// One full poll pass: snapshot the head, refresh the block feed, top up
/// the transaction list (digging into history when under-filled), then
/// merge, sort and truncate.
pub async fn tick<C: ChainReader + Sync>(
    chain: &C,
    cfg: &LiveConfig,
    state: &mut LiveState,
) -> Result<LiveView, RpcError> {
    let head = chain.current_height().await?;
    let gas_price = chain.gas_price().await?;
    let chain_id = chain.chain_id().await?;

    if state.history_pointer.is_none() {
        state.history_pointer = Some(head.saturating_sub(cfg.display_blocks));
    }

    // Latest blocks, newest first, fetched concurrently without bodies.
    let display_heights: Vec<u64> = (0..cfg.display_blocks)
        .filter_map(|i| head.checked_sub(i))
        .collect();
    let blocks = fetch_blocks(chain, &display_heights).await;

    let mut incoming: Vec<String> = blocks
        .iter()
        .flat_map(|b| b.transactions.hashes())
        .collect();

    if incoming.len() > cfg.tx_sufficiency {
        // Full enough from live blocks alone; keep the digger near the
        // head. History skipped by this reset stays skipped.
        state.history_pointer = Some(head.saturating_sub(cfg.dig_chunk));
    } else {
        let start = state
            .history_pointer
            .unwrap_or_else(|| head.saturating_sub(cfg.display_blocks));
        debug!(start, "live window under-filled; digging history");
        let targets: Vec<u64> = (0..cfg.dig_chunk)
            .filter_map(|i| start.checked_sub(i))
            .filter(|&h| h > 0)
            .collect();
        for block in fetch_blocks(chain, &targets).await {
            incoming.extend(block.transactions.hashes());
        }
        state.history_pointer = Some(start.saturating_sub(cfg.dig_chunk));
    }

    // Never re-fetch anything already rendered.
    let mut batch = HashSet::new();
    let unique: Vec<String> = incoming
        .into_iter()
        .filter(|h| !state.seen.contains(h) && batch.insert(h.clone()))
        .collect();

    if !unique.is_empty() {
        debug!(count = unique.len(), "resolving new transactions");
    }
    let resolved = join_all(unique.iter().map(|h| chain.get_transaction(h))).await;
    for res in resolved {
        let tx = match res {
            Ok(Some(tx)) => tx,
            Ok(None) => continue,
            Err(e) => {
                debug!(error = %e, "transaction fetch failed; will retry next pass");
                continue;
            }
        };
        match LiveTx::from_wire(&tx) {
            Ok(live) => {
                state.seen.insert(live.hash.clone());
                state.txs.push(live);
            }
            Err(e) => warn!(hash = %tx.hash, error = %e, "skipping malformed transaction"),
        }
    }

    state.txs.sort_by(|a, b| b.block.cmp(&a.block));
    state.txs.truncate(cfg.display_cap);

    let mut summaries = Vec::with_capacity(blocks.len());
    for block in &blocks {
        summaries.push(BlockSummary::from_wire(block)?);
    }

    Ok(LiveView {
        stats: NetworkStats {
            height: head,
            gas_price: gas_price.to_string(),
            chain_id,
        },
        blocks: summaries,
        txs: state.txs.clone(),
    })
}

async fn fetch_blocks<C: ChainReader + Sync>(chain: &C, heights: &[u64]) -> Vec<Block> {
    let fetched = join_all(heights.iter().map(|&h| chain.get_block(h, false))).await;
    let mut out = Vec::new();
    for res in fetched {
        match res {
            Ok(Some(b)) => out.push(b),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "block fetch failed"),
        }
    }
    out
}

/// The poll loop. Sequential awaits on one interval are the single-flight
/// guard: a tick that outlives the period simply delays the next one.
pub async fn run_live<C: ChainReader + Sync>(
    chain: C,
    cfg: LiveConfig,
    shared: Arc<RwLock<Option<LiveView>>>,
) {
    let mut state = LiveState::default();
    let mut interval = tokio::time::interval(cfg.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match tick(&chain, &cfg, &mut state).await {
            Ok(view) => {
                *shared.write().await = Some(view);
            }
            Err(e) => warn!(error = %e, "live poll failed"),
        }
    }
}
