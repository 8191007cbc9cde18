//! The reverse scanner: walks block history from the persisted cursor (or
//! the current head on first run) down to genesis, normalizing every
//! transaction into the store.

use std::time::Duration;

use flowscan_core::net::{ChainReader, RpcError};
use flowscan_core::record::TxRecord;
use flowscan_core::retry::RetryPolicy;
use flowscan_core::store::{CursorStore, StoreError, TxStore};
use flowscan_core::types::QuantityError;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from one scan pass. All of them leave the cursor untouched.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("malformed block data: {0}")]
    Quantity(#[from] QuantityError),
}

/// Drives the backfill loop. Single writer of the cursor and the
/// transaction collection.
pub struct Scanner<C, S> {
    chain: C,
    store: S,
    retry: RetryPolicy,
}

impl<C, S> Scanner<C, S>
where
    C: ChainReader,
    S: CursorStore + TxStore,
{
    pub fn new(chain: C, store: S) -> Self {
        Scanner {
            chain,
            store,
            retry: RetryPolicy::new(3, Duration::from_millis(500)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Starting height: the persisted cursor, or the current head on a
    /// fresh deployment (persisted before the first iteration so a crash
    /// during block 1 of the scan still resumes from the same point).
    async fn start_height(&self) -> Result<i64, ScanError> {
        if let Some(h) = self.store.cursor()? {
            info!(cursor = h, "resuming from persisted cursor");
            return Ok(h);
        }
        let chain = &self.chain;
        let head = self.retry.run(|| chain.current_height()).await?;
        self.store.set_cursor(head as i64)?;
        info!(head, "no cursor found; starting at current head");
        Ok(head as i64)
    }

    /// Runs until the cursor drops below genesis.
    ///
    /// A failed pass (fetch retries exhausted, store write error) never
    /// advances the cursor; the same height is re-attempted after one
    /// retry delay. Termination is therefore guaranteed only while the
    /// node and the store stay reachable.
    pub async fn run(&self) -> Result<(), ScanError> {
        let mut height = self.start_height().await?;
        if height < 0 {
            info!("scan already complete; nothing below genesis");
            return Ok(());
        }
        info!(start = height, "reverse scan started");
        while height >= 0 {
            match self.scan_height(height as u64).await {
                Ok(saved) => {
                    if saved > 0 {
                        info!(height, saved, "💾 saved transactions");
                    } else {
                        debug!(height, "no transactions");
                    }
                    height -= 1;
                }
                Err(e) => {
                    warn!(height, error = %e, "scan pass failed; will retry height");
                    tokio::time::sleep(self.retry.delay).await;
                }
            }
        }
        info!("✓ reverse scan reached genesis");
        Ok(())
    }

    /// One unit of work: fetch the block with full bodies, upsert its
    /// transactions as a single batch, then checkpoint `height - 1`.
    /// The cursor write comes last so a crash anywhere in the pass replays
    /// the whole (idempotent) pass.
    async fn scan_height(&self, height: u64) -> Result<usize, ScanError> {
        let chain = &self.chain;
        let block = self.retry.run(|| chain.get_block(height, true)).await?;

        let saved = match block {
            Some(block) => {
                let time = block.time()?;
                let mut records = Vec::with_capacity(block.transactions.len());
                for tx in block.transactions.full() {
                    records.push(TxRecord::from_chain(tx, height, time)?);
                }
                self.store.upsert_batch(&records)?
            }
            None => {
                debug!(height, "node returned no block; treating as empty");
                0
            }
        };

        self.store.set_cursor(height as i64 - 1)?;
        Ok(saved)
    }
}
