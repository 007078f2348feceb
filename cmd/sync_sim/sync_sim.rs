use clap::Parser;
use shardnode_sync_sim::{cli::Options, initializers::init_tracing, simulation};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let opts = Options::parse();
    init_tracing(&opts)?;

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling sync");
            shutdown.cancel();
        }
    });

    let report = simulation::run(&opts, &cancel_token).await?;
    info!(
        root = %report.root,
        nodes = report.num_nodes,
        requested = report.stats.num_requested,
        distinct_requested = report.stats.num_distinct_requested,
        batches = report.stats.num_request_batches,
        received = report.stats.num_received,
        bytes = report.stats.num_bytes_received,
        max_missing = report.stats.max_num_missing,
        elapsed = ?report.stats.elapsed,
        "Synced trie matches source"
    );

    Ok(())
}
