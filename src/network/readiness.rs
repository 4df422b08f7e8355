//! Startup barrier: every peer must be reachable before the first broadcast

use crate::config::AddressBook;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Readiness: Send + Sync {
    /// Whether all peers can currently be reached
    async fn all_ready(&self) -> bool;
}

/// Polls `readiness` every `interval` until it reports ready.
pub async fn wait_until_ready(readiness: &dyn Readiness, interval: Duration) {
    let mut polls = 0u64;
    while !readiness.all_ready().await {
        polls += 1;
        if polls % 50 == 0 {
            debug!(polls, "Still waiting for peers");
        }
        tokio::time::sleep(interval).await;
    }
}

/// In-process record of which peers have bound their endpoint
#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    total_nodes: usize,
    ready: Arc<RwLock<HashSet<usize>>>,
}

impl ReadinessTracker {
    pub fn new(total_nodes: usize) -> Self {
        ReadinessTracker {
            total_nodes,
            ready: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn mark_ready(&self, node_id: usize) {
        if node_id < self.total_nodes {
            self.ready.write().insert(node_id);
        }
    }

    pub fn ready_count(&self) -> usize {
        self.ready.read().len()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_count() == self.total_nodes
    }
}

#[async_trait]
impl Readiness for ReadinessTracker {
    async fn all_ready(&self) -> bool {
        self.is_ready()
    }
}

/// Treats a peer as reachable once its status route answers at all; a
/// faulty peer's `500` counts as reachable.
pub struct HttpReadiness {
    client: Client,
    addresses: AddressBook,
}

impl HttpReadiness {
    pub fn new(client: Client, addresses: AddressBook) -> Self {
        HttpReadiness { client, addresses }
    }
}

#[async_trait]
impl Readiness for HttpReadiness {
    async fn all_ready(&self) -> bool {
        for (_, url) in self.addresses.iter() {
            if self
                .client
                .get(format!("{}/status", url))
                .send()
                .await
                .is_err()
            {
                return false;
            }
        }
        true
    }
}

/// Barrier that is always open
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

#[async_trait]
impl Readiness for AlwaysReady {
    async fn all_ready(&self) -> bool {
        true
    }
}
