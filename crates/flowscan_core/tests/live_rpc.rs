use std::env;

use flowscan_core::net::{ChainReader, RpcClient};
use flowscan_core::record::TxRecord;

/// Integration-style test that walks a few recent blocks over a real node.
///
/// Skipped unless `RPC_URL` is set. To use it:
/// - point `RPC_URL` at an Ethereum-compatible endpoint
///   (e.g. `http://127.0.0.1:8545`);
/// - run: `cargo test -p flowscan_core live_scan_recent_blocks`.
#[tokio::test]
async fn live_scan_recent_blocks() -> Result<(), Box<dyn std::error::Error>> {
    let url = match env::var("RPC_URL") {
        Ok(u) => u,
        Err(_) => {
            eprintln!("RPC_URL not set; skipping live RPC test");
            return Ok(());
        }
    };

    let client = RpcClient::new(&url)?;
    let head = client.current_height().await?;
    assert!(head > 0);

    for height in (head.saturating_sub(2))..=head {
        let block = match client.get_block(height, true).await? {
            Some(b) => b,
            None => continue,
        };
        assert_eq!(block.height()?, height);
        let time = block.time()?;
        for tx in block.transactions.full() {
            let rec = TxRecord::from_chain(tx, height, time)?;
            assert_eq!(rec.from, rec.from.to_lowercase());
            assert!(rec.is_native);
        }
    }

    Ok(())
}
