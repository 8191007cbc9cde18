//! Chain-facing networking: the JSON-RPC client and the read trait the
//! scan loops are written against.

use std::future::Future;

use alloy_primitives::U256;

use crate::types::{Block, Transaction};

pub mod rpc;

pub use rpc::{RpcClient, RpcError};

/// The subset of node reads the reverse scanner and the live poller need.
///
/// Both loops are generic over this trait so they can run against a mock
/// chain in tests. Futures are required to be `Send` because the poller
/// runs inside a spawned task.
pub trait ChainReader {
    /// Height of the most recent block known to the node.
    fn current_height(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;

    /// Block at `height`, with full transaction bodies when `full` is set.
    /// `Ok(None)` means the node does not (yet) know the block.
    fn get_block(
        &self,
        height: u64,
        full: bool,
    ) -> impl Future<Output = Result<Option<Block>, RpcError>> + Send;

    /// Transaction body by hash; `Ok(None)` when not (yet) visible.
    fn get_transaction(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Option<Transaction>, RpcError>> + Send;

    /// Current gas price in wei.
    fn gas_price(&self) -> impl Future<Output = Result<U256, RpcError>> + Send;

    /// Network identifier.
    fn chain_id(&self) -> impl Future<Output = Result<u64, RpcError>> + Send;
}

impl<T: ChainReader + Sync> ChainReader for std::sync::Arc<T> {
    fn current_height(&self) -> impl Future<Output = Result<u64, RpcError>> + Send {
        (**self).current_height()
    }

    fn get_block(
        &self,
        height: u64,
        full: bool,
    ) -> impl Future<Output = Result<Option<Block>, RpcError>> + Send {
        (**self).get_block(height, full)
    }

    fn get_transaction(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Option<Transaction>, RpcError>> + Send {
        (**self).get_transaction(hash)
    }

    fn gas_price(&self) -> impl Future<Output = Result<U256, RpcError>> + Send {
        (**self).gas_price()
    }

    fn chain_id(&self) -> impl Future<Output = Result<u64, RpcError>> + Send {
        (**self).chain_id()
    }
}

impl<T: ChainReader + Sync> ChainReader for &T {
    fn current_height(&self) -> impl Future<Output = Result<u64, RpcError>> + Send {
        (**self).current_height()
    }

    fn get_block(
        &self,
        height: u64,
        full: bool,
    ) -> impl Future<Output = Result<Option<Block>, RpcError>> + Send {
        (**self).get_block(height, full)
    }

    fn get_transaction(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Option<Transaction>, RpcError>> + Send {
        (**self).get_transaction(hash)
    }

    fn gas_price(&self) -> impl Future<Output = Result<U256, RpcError>> + Send {
        (**self).gas_price()
    }

    fn chain_id(&self) -> impl Future<Output = Result<u64, RpcError>> + Send {
        (**self).chain_id()
    }
}
