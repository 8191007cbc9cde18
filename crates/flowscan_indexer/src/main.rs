use std::env;
use std::time::Duration;

use anyhow::Context;
use colored::*;
use flowscan_core::net::RpcClient;
use flowscan_core::retry::RetryPolicy;
use flowscan_core::store::SqliteStore;
use tracing_subscriber::EnvFilter;

use crate::scan::Scanner;

mod scan;

const DEFAULT_DB_PATH: &str = "./data/flowscan.db";

fn print_banner() {
    println!(
        "{}",
        "═══════════════════════════════════════════════════════".bright_magenta()
    );
    println!("{}", "  F L O W S C A N   •   I N D E X E R".bright_cyan().bold());
    println!(
        "{}",
        "  Reverse-scanning native transfer backfill".bright_yellow()
    );
    println!(
        "{}",
        "═══════════════════════════════════════════════════════".bright_magenta()
    );
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    print_banner();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let url = env::var("RPC_URL").context("RPC_URL must be set")?;
    let db_path = env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    // Either of these failing is fatal: the operator restarts the process
    // and resumption comes from the persisted cursor.
    let client = RpcClient::new(&url).context("invalid RPC endpoint")?;
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("cannot open store at {db_path}"))?;

    Scanner::new(client, store)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(500)))
        .run()
        .await?;

    Ok(())
}
