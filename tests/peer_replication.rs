//! Two real nodes over HTTP: bootstrap join, chain adoption, and gossip.
//!
//! Each node runs the production router on an ephemeral port and talks to the
//! other through the production `HttpPeerClient`; nothing is mocked below
//! the transport.

use custodychain::api::{build_api_router, Node};
use custodychain::ledger::ChainStore;
use custodychain::peers::PeerRegistry;
use custodychain::persistence::InMemoryPersistence;
use custodychain::sync::{HttpPeerClient, SyncPhase, SyncService, SyncSettings};
use custodychain::transaction::Transaction;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct TestNode {
    url: String,
    sync: Arc<SyncService>,
}

/// Boot a node: bind an ephemeral port, serve the real router, then run the
/// join/sync startup sequence exactly as the orchestrator does.
async fn spawn_node(bootstrap: Option<String>) -> TestNode {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let chain = Arc::new(RwLock::new(ChainStore::new(1)));
    let peers = PeerRegistry::new();
    let sync = Arc::new(SyncService::new(
        chain.clone(),
        peers.clone(),
        Arc::new(InMemoryPersistence::new()),
        Arc::new(HttpPeerClient::new(Duration::from_millis(800)).unwrap()),
        SyncSettings {
            self_url: url.clone(),
            bootstrap_url: bootstrap,
            peer_timeout: Duration::from_millis(800),
            gossip_timeout: Duration::from_millis(800),
        },
    ));

    let api = Arc::new(Node::new_shared(sync.clone(), chain, peers));
    let app = build_api_router(api);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    sync.join().await;
    sync.initial_sync().await;
    TestNode { url, sync }
}

/// Poll until the node's chain reaches `height` or the deadline passes.
async fn wait_for_height(node: &TestNode, height: u64) -> bool {
    for _ in 0..50 {
        if node.sync.chain().read().await.ledger().height() >= height {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_join_adopt_and_gossip_between_real_nodes() {
    // Node A starts alone and mines one custody event.
    let node_a = spawn_node(None).await;
    assert_eq!(node_a.sync.phase().await, SyncPhase::Steady);
    node_a
        .sync
        .submit(Transaction::create("SKU-1", "alice", ""))
        .await
        .unwrap();

    // Node B bootstraps from A: it must learn A's peers and adopt A's chain.
    let node_b = spawn_node(Some(node_a.url.clone())).await;
    assert_eq!(node_b.sync.phase().await, SyncPhase::Steady);

    assert!(node_b.sync.peers().contains(&node_a.url));
    assert!(node_a.sync.peers().contains(&node_b.url));

    {
        let chain_a = node_a.sync.chain();
        let chain_b = node_b.sync.chain();
        let store_a = chain_a.read().await;
        let store_b = chain_b.read().await;
        assert_eq!(store_b.ledger().blocks(), store_a.ledger().blocks());
        assert_eq!(store_b.world().owner_of("SKU-1"), Some("alice"));
    }

    // A mutation on B gossips to A, which re-mines it into its own chain.
    node_b
        .sync
        .submit(Transaction::transfer("SKU-1", "alice", "bob", ""))
        .await
        .unwrap();

    assert!(wait_for_height(&node_a, 3).await, "gossip never reached node A");
    let chain_a = node_a.sync.chain();
    let store_a = chain_a.read().await;
    assert_eq!(store_a.world().owner_of("SKU-1"), Some("bob"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_bootstrap_still_serves() {
    // Nothing listens on this port; the node must come up alone regardless.
    let node = spawn_node(Some("http://127.0.0.1:1".to_string())).await;

    assert_eq!(node.sync.phase().await, SyncPhase::Steady);
    assert_eq!(node.sync.chain().read().await.ledger().height(), 1);

    node.sync
        .submit(Transaction::create("SKU-1", "alice", ""))
        .await
        .unwrap();
    assert_eq!(node.sync.chain().read().await.ledger().height(), 2);
}
