//! Node orchestrator: wires configuration, persistence, the chain store, and
//! the sync service together and enforces the startup order. The node joins
//! the overlay and finishes its initial synchronization before the HTTP
//! listener binds, so requests are never answered from an uninitialized
//! ledger.

use crate::config::Config;
use crate::ledger::ChainStore;
use crate::peers::PeerRegistry;
use crate::persistence::{Database, InMemoryPersistence, Persistence};
use crate::sync::{HttpPeerClient, SyncService, SyncSettings};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub struct Node {
    pub config: Config,
    pub chain: Arc<RwLock<ChainStore>>,
    pub peers: PeerRegistry,
    pub sync: Arc<SyncService>,
    pub persistence: Arc<dyn Persistence>,
}

impl Node {
    pub fn init(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        info!(
            public_url = %config.public_url(),
            difficulty = config.chain.difficulty,
            "Starting custodychain node"
        );

        // Ensure the data directory (parent of the DB path) exists
        let db_path = std::path::Path::new(&config.database.path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create data dir {:?}: {}", parent, e))?;
            }
        }

        let persistence: Arc<dyn Persistence> = match Database::open(&config.database.path) {
            Ok(db) => Arc::new(db),
            Err(e) => {
                warn!(
                    path = %config.database.path,
                    error = %e,
                    "Failed to open database; falling back to in-memory persistence"
                );
                Arc::new(InMemoryPersistence::new())
            }
        };

        let difficulty = config.chain.difficulty;
        let store = match persistence.load_chain() {
            Ok(blocks) if !blocks.is_empty() => {
                match ChainStore::from_blocks(blocks, difficulty) {
                    Ok(store) => {
                        info!(height = store.ledger().height(), "Loaded chain from persistence");
                        store
                    }
                    Err(e) => {
                        warn!(error = %e, "Persisted chain is invalid; starting from genesis");
                        ChainStore::new(difficulty)
                    }
                }
            }
            Ok(_) => ChainStore::new(difficulty),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted chain; starting from genesis");
                ChainStore::new(difficulty)
            }
        };
        if let Err(e) = persistence.replace_chain(store.ledger().blocks()) {
            warn!(error = %e, "Failed to persist initial chain");
        }

        let chain = Arc::new(RwLock::new(store));
        let peers = PeerRegistry::new();

        let peer_timeout = Duration::from_millis(config.network.peer_timeout_ms);
        let client = Arc::new(HttpPeerClient::new(peer_timeout)?);
        let sync = Arc::new(SyncService::new(
            chain.clone(),
            peers.clone(),
            persistence.clone(),
            client,
            SyncSettings {
                self_url: config.public_url(),
                bootstrap_url: config.network.bootstrap_url.clone(),
                peer_timeout,
                gossip_timeout: Duration::from_millis(config.network.gossip_timeout_ms),
            },
        ));

        Ok(Self {
            config,
            chain,
            peers,
            sync,
            persistence,
        })
    }

    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        // Join and synchronize before accepting any request. An isolated node
        // comes out of this with its own genesis chain and serves normally.
        self.sync.join().await;
        self.sync.initial_sync().await;

        Node::serve_api(self).await
    }

    #[cfg(feature = "api")]
    async fn serve_api(node: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        let api_node = Arc::new(crate::api::Node::new_shared(
            node.sync.clone(),
            node.chain.clone(),
            node.peers.clone(),
        ));

        let port = node.config.network.listen_port;
        info!(port = port, "Starting REST API server");
        crate::api::run_api_server(api_node, port).await
    }

    #[cfg(not(feature = "api"))]
    async fn serve_api(_node: Arc<Self>) -> Result<(), Box<dyn std::error::Error>> {
        Err("API feature not enabled in this build".into())
    }
}
