//! Shared building blocks for the flowscan explorer: a JSON-RPC chain
//! client, normalized transaction records, a retry policy and the SQLite
//! store both processes read and the indexer writes.

pub mod net;
pub mod record;
pub mod retry;
pub mod store;
pub mod types;
