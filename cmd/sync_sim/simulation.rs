use std::{sync::Arc, time::Duration};

use ethereum_types::H256;
use eyre::{WrapErr, bail};
use rand::{SeedableRng, rngs::StdRng};
use shardnode_trie::{InMemoryTrieDB, Trie, TrieDB};
use shardnode_trie_sync::{
    TrieSyncConfig, TrieSyncStatistics, TrieSyncStatisticsSnapshot, TrieSyncer,
    loopback::{LoopbackPeer, populate_random_trie},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cli::Options;

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub root: H256,
    pub num_nodes: usize,
    pub stats: TrieSyncStatisticsSnapshot,
}

/// Builds a random source trie, syncs it into an empty store through a loopback peer
/// and checks every source node made it to the destination unchanged
pub async fn run(
    opts: &Options,
    cancel_token: &CancellationToken,
) -> eyre::Result<SimulationReport> {
    let config = opts.sync_config(
        TrieSyncConfig::from_env().wrap_err("invalid TRIE_SYNC_* environment variables")?,
    );
    debug!(?config, "Loaded trie sync config");

    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let source = InMemoryTrieDB::new_empty();
    let mut source_trie = Trie::new(Arc::new(source.clone()));
    let root = populate_random_trie(&mut source_trie, opts.leaves, &mut rng)?;
    let source_nodes = source.entries()?;
    info!(%root, leaves = opts.leaves, nodes = source_nodes.len(), "Built source trie");

    let cache = Arc::new(config.new_intercepted_nodes_cache()?);
    let mut peer = LoopbackPeer::new(Arc::new(source.clone()), cache.clone())
        .with_latency(Duration::from_millis(opts.peer_latency_ms))
        .with_drop_rate(opts.peer_drop_rate);
    if let Some(seed) = opts.seed {
        peer = peer.with_seed(seed);
    }

    let destination = InMemoryTrieDB::new_empty();
    let statistics = Arc::new(TrieSyncStatistics::new());
    let syncer = TrieSyncer::new(config.into_args(
        Arc::new(peer),
        cache,
        Arc::new(Trie::new(Arc::new(destination.clone()))),
        statistics.clone(),
    ))?;

    syncer.start_syncing(root, cancel_token).await?;

    for (hash, encoded) in source_nodes.iter() {
        match destination.get(*hash)? {
            Some(synced) if synced == *encoded => {}
            Some(_) => bail!("synced node {hash:#x} differs from source"),
            None => bail!("node {hash:#x} missing after sync"),
        }
    }

    Ok(SimulationReport {
        root,
        num_nodes: source_nodes.len(),
        stats: statistics.snapshot(),
    })
}
