use std::env;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use flowscan_core::net::RpcClient;
use flowscan_core::retry::RetryPolicy;
use flowscan_core::store::SqliteStore;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::live::LiveConfig;
use crate::server::AppState;

mod live;
mod server;

const DEFAULT_DB_PATH: &str = "./data/flowscan.db";

#[derive(Parser, Debug)]
#[command(name = "flowscan-web")]
#[command(about = "Live feed poller and JSON query surface for the flowscan explorer", long_about = None)]
struct Args {
    /// Address to serve the API on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// JSON-RPC endpoint; falls back to the RPC_URL environment variable
    #[arg(long)]
    rpc: Option<String>,

    /// SQLite database path; falls back to DB_PATH, then ./data/flowscan.db
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let url = args
        .rpc
        .or_else(|| env::var("RPC_URL").ok())
        .context("provide an RPC endpoint via --rpc or RPC_URL")?;
    let db_path = args
        .db
        .or_else(|| env::var("DB_PATH").ok())
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

    let chain = Arc::new(RpcClient::new(&url).context("invalid RPC endpoint")?);
    let store = Arc::new(
        SqliteStore::open(&db_path).with_context(|| format!("cannot open store at {db_path}"))?,
    );

    let live = Arc::new(RwLock::new(None));
    tokio::spawn(live::run_live(
        chain.clone(),
        LiveConfig::default(),
        live.clone(),
    ));

    let app = server::router(AppState {
        store,
        chain,
        live,
        lookup: RetryPolicy::lookup(),
    });

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("cannot bind {}", args.listen))?;
    info!(listen = %args.listen, "flowscan web started");
    axum::serve(listener, app).await?;

    Ok(())
}
