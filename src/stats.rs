use log::{info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct ProxyStats {
    // Aggregate stats per virtual host
    per_host: HashMap<String, HostStats>,
    unknown_host_requests: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostStats {
    pub cache_hits: u64,
    pub origin_fetches: u64,
    pub origin_failures: u64,
    pub bytes_fetched: u64,
}

impl HostStats {
    /// Every request that did not hit the cache went to the origin.
    pub fn cache_misses(&self) -> u64 {
        self.origin_fetches + self.origin_failures
    }
}

#[derive(Debug)]
pub enum StatsMessage {
    CacheHit { host: String },
    OriginFetched { host: String, bytes: u64 },
    OriginFailed { host: String },
    UnknownHost { host: String },
}

/// Queues a sample without waiting; a full channel drops it.
pub fn report(stats_tx: &mpsc::Sender<StatsMessage>, message: StatsMessage) {
    if let Err(err) = stats_tx.try_send(message) {
        warn!("Failed to send proxy stats: {}", err);
    }
}

impl ProxyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a message to update the stats
    pub fn handle_message(&mut self, message: StatsMessage) {
        match message {
            StatsMessage::CacheHit { host } => {
                self.per_host.entry(host).or_default().cache_hits += 1;
            }
            StatsMessage::OriginFetched { host, bytes } => {
                let entry = self.per_host.entry(host).or_default();
                entry.origin_fetches += 1;
                entry.bytes_fetched += bytes;
            }
            StatsMessage::OriginFailed { host } => {
                self.per_host.entry(host).or_default().origin_failures += 1;
            }
            StatsMessage::UnknownHost { .. } => {
                self.unknown_host_requests += 1;
            }
        }
    }

    pub fn host(&self, host: &str) -> Option<&HostStats> {
        self.per_host.get(host)
    }

    pub fn unknown_host_requests(&self) -> u64 {
        self.unknown_host_requests
    }

    /// Display statistics
    pub fn print_stats(&self) {
        for (host, stats) in &self.per_host {
            info!(
                "Host: {} | Cache Hits: {} | Cache Misses: {} | Origin Failures: {} | Bytes Fetched: {}",
                host,
                stats.cache_hits,
                stats.cache_misses(),
                stats.origin_failures,
                stats.bytes_fetched
            );
        }
        if self.unknown_host_requests > 0 {
            info!("Unknown host requests: {}", self.unknown_host_requests);
        }
    }
}
