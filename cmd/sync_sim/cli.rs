use clap::Parser as ClapParser;
use shardnode_trie_sync::TrieSyncConfig;
use tracing::Level;

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[derive(ClapParser, Debug, Clone)]
#[command(
    name = "shardnode-sync-sim",
    author,
    version = VERSION_STRING,
    about = "Syncs a random trie from an in-process peer and checks the result",
    long_about = None
)]
pub struct Options {
    #[arg(long = "log.level", default_value_t = Level::INFO, value_name = "LOG_LEVEL")]
    pub log_level: Level,
    #[arg(
        long = "leaves",
        default_value_t = 10_000,
        value_name = "NUM_LEAVES",
        env = "SYNC_SIM_LEAVES",
        help = "Amount of random leaves in the source trie"
    )]
    pub leaves: usize,
    #[arg(long = "seed", value_name = "SEED", env = "SYNC_SIM_SEED")]
    pub seed: Option<u64>,
    #[arg(
        long = "peer.latency",
        default_value_t = 10,
        value_name = "MILLIS",
        env = "SYNC_SIM_PEER_LATENCY",
        help_heading = "Peer options"
    )]
    pub peer_latency_ms: u64,
    #[arg(
        long = "peer.drop-rate",
        default_value_t = 0.0,
        value_name = "RATE",
        env = "SYNC_SIM_PEER_DROP_RATE",
        help = "Probability in [0, 1] of the peer ignoring a requested node",
        help_heading = "Peer options"
    )]
    pub peer_drop_rate: f64,
    #[arg(
        long = "sync.timeout",
        value_name = "MILLIS",
        help = "Overrides TRIE_SYNC_TIMEOUT_BETWEEN_COMMITS_MS",
        help_heading = "Sync options"
    )]
    pub sync_timeout_ms: Option<u64>,
    #[arg(
        long = "sync.max-missing",
        value_name = "COUNT",
        help = "Overrides TRIE_SYNC_MAX_HARD_CAP_FOR_MISSING_NODES",
        help_heading = "Sync options"
    )]
    pub sync_max_missing: Option<usize>,
    #[arg(
        long = "sync.request-interval",
        value_name = "MILLIS",
        help = "Overrides TRIE_SYNC_REQUEST_INTERVAL_MS",
        help_heading = "Sync options"
    )]
    pub sync_request_interval_ms: Option<u64>,
    #[arg(
        long = "sync.cache-capacity",
        value_name = "COUNT",
        help = "Overrides TRIE_SYNC_INTERCEPTED_NODES_CAPACITY",
        help_heading = "Sync options"
    )]
    pub sync_cache_capacity: Option<usize>,
}

impl Options {
    /// Applies the command line overrides on top of `base`
    pub fn sync_config(&self, base: TrieSyncConfig) -> TrieSyncConfig {
        TrieSyncConfig {
            timeout_between_commits_ms: self
                .sync_timeout_ms
                .unwrap_or(base.timeout_between_commits_ms),
            max_hard_cap_for_missing_nodes: self
                .sync_max_missing
                .unwrap_or(base.max_hard_cap_for_missing_nodes),
            request_interval_ms: self
                .sync_request_interval_ms
                .unwrap_or(base.request_interval_ms),
            intercepted_nodes_capacity: self
                .sync_cache_capacity
                .unwrap_or(base.intercepted_nodes_capacity),
            ..base
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            leaves: 10_000,
            seed: None,
            peer_latency_ms: 10,
            peer_drop_rate: 0.0,
            sync_timeout_ms: None,
            sync_max_missing: None,
            sync_request_interval_ms: None,
            sync_cache_capacity: None,
        }
    }
}
