//! Peer synchronization for custodychain
//!
//! This module owns the node's replication lifecycle:
//! - bootstrap join and peer-list merging
//! - full-chain snapshot adoption against every reachable peer
//! - best-effort transaction gossip after local mutations
//! - per-peer failure counting
//!
//! The outbound HTTP capability is behind the [`PeerClient`] trait so the
//! protocol logic stays independent of the transport and testable with
//! scripted peers.

use crate::error::ChainError;
use crate::ledger::{chain_work, Block, ChainStore};
use crate::peers::PeerRegistry;
use crate::persistence::Persistence;
use crate::transaction::Transaction;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Node lifecycle phases. Requests are only served once the node is Steady,
/// so a chain or state query never observes an uninitialized ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Joining,
    Syncing,
    Steady,
}

/// Outbound calls the sync protocol needs from the transport layer.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Announce `self_url` to `peer` and fetch its peer list.
    async fn register(&self, peer: &str, self_url: &str) -> Result<Vec<String>, ChainError>;

    /// Fetch the peer's full chain snapshot.
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, ChainError>;

    /// Deliver one raw transaction to a peer.
    async fn send_transaction(&self, peer: &str, tx: &Transaction) -> Result<(), ChainError>;
}

/// Production [`PeerClient`] speaking the node's own REST dialect.
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpPeerClient { client })
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn register(&self, peer: &str, self_url: &str) -> Result<Vec<String>, ChainError> {
        let url = format!("{}/peers", peer);
        let body = serde_json::json!({ "peer_url": self_url });
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChainError::NetworkError(format!(
                "Peer registration at {} failed with status {}",
                peer, status
            )));
        }
        Ok(resp.json::<Vec<String>>().await?)
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, ChainError> {
        let url = format!("{}/chain", peer);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChainError::NetworkError(format!(
                "Chain fetch from {} failed with status {}",
                peer, status
            )));
        }
        Ok(resp.json::<Vec<Block>>().await?)
    }

    async fn send_transaction(&self, peer: &str, tx: &Transaction) -> Result<(), ChainError> {
        let url = format!("{}/receive", peer);
        let resp = self.client.post(&url).json(tx).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ChainError::NetworkError(format!(
                "Transaction delivery to {} failed with status {}",
                peer, status
            )));
        }
        Ok(())
    }
}

/// Reference to the block that sealed an accepted mutation.
#[derive(Debug, Clone, Serialize)]
pub struct BlockRef {
    pub index: u64,
    pub hash: String,
}

impl BlockRef {
    fn of(block: &Block) -> Self {
        BlockRef {
            index: block.index,
            hash: block.hash_str(),
        }
    }
}

/// Outcome of an inbound peer transaction.
#[derive(Debug, Clone)]
pub enum ReceiveOutcome {
    Applied(BlockRef),
    Ignored,
}

/// Settings the sync service needs from node configuration.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub self_url: String,
    pub bootstrap_url: Option<String>,
    /// Timeout for join and snapshot fetches
    pub peer_timeout: Duration,
    /// Timeout for fire-and-forget gossip deliveries
    pub gossip_timeout: Duration,
}

/// Orchestrates bootstrap join, chain adoption, and transaction gossip.
pub struct SyncService {
    chain: Arc<RwLock<ChainStore>>,
    peers: PeerRegistry,
    persistence: Arc<dyn Persistence>,
    client: Arc<dyn PeerClient>,
    settings: SyncSettings,
    phase: Arc<RwLock<SyncPhase>>,
    /// Delivery/fetch failures per peer, cleared on success. Observability
    /// only; nothing is evicted on its account yet.
    failures: Arc<RwLock<HashMap<String, u32>>>,
}

impl SyncService {
    pub fn new(
        chain: Arc<RwLock<ChainStore>>,
        peers: PeerRegistry,
        persistence: Arc<dyn Persistence>,
        client: Arc<dyn PeerClient>,
        settings: SyncSettings,
    ) -> Self {
        SyncService {
            chain,
            peers,
            persistence,
            client,
            settings,
            phase: Arc::new(RwLock::new(SyncPhase::Joining)),
            failures: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn chain(&self) -> Arc<RwLock<ChainStore>> {
        self.chain.clone()
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn self_url(&self) -> &str {
        &self.settings.self_url
    }

    pub async fn phase(&self) -> SyncPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write().await = phase;
    }

    pub async fn failure_count(&self, peer: &str) -> u32 {
        self.failures.read().await.get(peer).copied().unwrap_or(0)
    }

    pub async fn failure_counts(&self) -> HashMap<String, u32> {
        self.failures.read().await.clone()
    }

    async fn record_failure(&self, peer: &str) {
        let mut failures = self.failures.write().await;
        *failures.entry(peer.to_string()).or_insert(0) += 1;
    }

    async fn clear_failures(&self, peer: &str) {
        self.failures.write().await.remove(peer);
    }

    /// JOINING: best-effort registration with the configured bootstrap peer
    /// and merge of its peer list. A missing or unreachable bootstrap leaves
    /// the node as the sole member of its own view.
    pub async fn join(&self) {
        self.set_phase(SyncPhase::Joining).await;

        if let Err(err) = self.peers.add(&self.settings.self_url) {
            warn!(error = %err, "Could not register own address in peer set");
        }

        let Some(bootstrap) = self.settings.bootstrap_url.clone() else {
            info!("No bootstrap peer configured; starting as sole member");
            return;
        };
        if bootstrap == self.settings.self_url {
            return;
        }

        let register = self.client.register(&bootstrap, &self.settings.self_url);
        match tokio::time::timeout(self.settings.peer_timeout, register).await {
            Ok(Ok(peer_list)) => {
                for peer in peer_list {
                    if let Err(err) = self.peers.add(&peer) {
                        warn!(peer = %peer, error = %err, "Skipped malformed peer from bootstrap");
                    }
                }
                let _ = self.peers.add(&bootstrap);
                self.clear_failures(&bootstrap).await;
                info!(peers = self.peers.len(), bootstrap = %bootstrap, "Joined overlay via bootstrap");
            }
            Ok(Err(err)) => {
                warn!(bootstrap = %bootstrap, error = %err, "Bootstrap join failed; continuing alone");
                self.record_failure(&bootstrap).await;
            }
            Err(_) => {
                warn!(bootstrap = %bootstrap, "Bootstrap join timed out; continuing alone");
                self.record_failure(&bootstrap).await;
            }
        }
    }

    /// SYNCING: request a snapshot from every known peer within the timeout,
    /// validate each candidate, and adopt the highest-scoring valid one if it
    /// strictly outworks the local chain. The node becomes Steady regardless
    /// of whether any peer answered: an isolated node simply keeps its own
    /// genesis chain.
    pub async fn initial_sync(&self) {
        self.set_phase(SyncPhase::Syncing).await;

        let peers: Vec<String> = self
            .peers
            .all()
            .into_iter()
            .filter(|p| *p != self.settings.self_url)
            .collect();

        if !peers.is_empty() {
            let fetches = peers.iter().map(|peer| {
                let client = self.client.clone();
                let timeout = self.settings.peer_timeout;
                let peer = peer.clone();
                async move {
                    let result = tokio::time::timeout(timeout, client.fetch_chain(&peer)).await;
                    (peer, result)
                }
            });
            let results = futures::future::join_all(fetches).await;

            let mut best: Option<(String, Vec<Block>, u128)> = None;
            {
                let store = self.chain.read().await;
                for (peer, result) in results {
                    match result {
                        Ok(Ok(blocks)) => match store.ledger().validate(&blocks) {
                            Ok(()) => {
                                self.clear_failures(&peer).await;
                                let work = chain_work(&blocks);
                                if best.as_ref().map_or(true, |(_, _, w)| work > *w) {
                                    best = Some((peer, blocks, work));
                                }
                            }
                            Err(err) => {
                                warn!(peer = %peer, error = %err, "Rejected invalid chain snapshot");
                            }
                        },
                        Ok(Err(err)) => {
                            warn!(peer = %peer, error = %err, "Chain snapshot fetch failed");
                            self.record_failure(&peer).await;
                        }
                        Err(_) => {
                            warn!(peer = %peer, "Chain snapshot fetch timed out");
                            self.record_failure(&peer).await;
                        }
                    }
                }
            }

            if let Some((peer, blocks, _)) = best {
                let mut store = self.chain.write().await;
                match store.adopt(blocks) {
                    Ok(true) => {
                        info!(peer = %peer, height = store.ledger().height(), "Adopted peer chain");
                        if let Err(err) = self.persistence.replace_chain(store.ledger().blocks()) {
                            warn!(error = %err, "Failed to persist adopted chain");
                        }
                    }
                    Ok(false) => {
                        info!(peer = %peer, "Local chain already carries the most work");
                    }
                    Err(err) => {
                        warn!(peer = %peer, error = %err, "Chain adoption failed");
                    }
                }
            }
        }

        self.set_phase(SyncPhase::Steady).await;
        info!("Synchronization complete; serving requests");
    }

    /// Mine a local mutation into the chain and gossip the raw transaction to
    /// every peer except self. The gossip fan-out runs outside the critical
    /// section: the block is already appended locally before any outbound
    /// call starts, so a slow peer never blocks local progress.
    pub async fn submit(&self, tx: Transaction) -> Result<BlockRef, ChainError> {
        let block = {
            let mut store = self.chain.write().await;
            let block = store.commit(vec![tx.clone()])?;
            if let Err(err) = self.persistence.save_block(&block) {
                warn!(error = %err, "Failed to persist block");
            }
            block
        };

        self.broadcast(tx).await;
        Ok(BlockRef::of(&block))
    }

    /// Apply an inbound peer transaction by re-mining it into our own next
    /// block. Never re-gossiped, which stops infinite relay; a transaction
    /// already present in the chain is ignored, which makes redelivery and
    /// gossip-then-adoption races harmless.
    pub async fn receive(&self, tx: Transaction) -> Result<ReceiveOutcome, ChainError> {
        let mut store = self.chain.write().await;
        if store.contains_transaction(&tx.hash()) {
            return Ok(ReceiveOutcome::Ignored);
        }

        let block = store.commit(vec![tx])?;
        if let Err(err) = self.persistence.save_block(&block) {
            warn!(error = %err, "Failed to persist block");
        }
        Ok(ReceiveOutcome::Applied(BlockRef::of(&block)))
    }

    /// Fire-and-forget gossip: one task per peer, bounded timeout, failures
    /// logged and counted, no retry queue and no delivery guarantee.
    async fn broadcast(&self, tx: Transaction) {
        for peer in self.peers.all() {
            if peer == self.settings.self_url {
                continue;
            }
            let client = self.client.clone();
            let failures = self.failures.clone();
            let timeout = self.settings.gossip_timeout;
            let tx = tx.clone();
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, client.send_transaction(&peer, &tx)).await {
                    Ok(Ok(())) => {
                        failures.write().await.remove(&peer);
                    }
                    Ok(Err(err)) => {
                        warn!(peer = %peer, error = %err, "Gossip delivery failed");
                        *failures.write().await.entry(peer).or_insert(0) += 1;
                    }
                    Err(_) => {
                        warn!(peer = %peer, "Gossip delivery timed out");
                        *failures.write().await.entry(peer).or_insert(0) += 1;
                    }
                }
            });
        }
    }
}
