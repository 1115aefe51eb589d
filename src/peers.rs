//! Peer registry: the set of node base URLs this node gossips with.
//!
//! A pure set, self included. No liveness tracking lives here; the sync
//! service layers failure counting on top. Not persisted: the set is rebuilt
//! through the bootstrap handshake on every start.

use crate::error::ChainError;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum peer URL length accepted by the registry
const MAX_PEER_URL_LENGTH: usize = 256;

#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<HashSet<String>>>,
}

/// Trim whitespace and a trailing slash so textual variants of the same base
/// URL collapse to one entry.
fn normalize(address: &str) -> String {
    address.trim().trim_end_matches('/').to_string()
}

fn validate(address: &str) -> Result<(), ChainError> {
    if address.is_empty() {
        return Err(ChainError::InvalidPeer("address is empty".to_string()));
    }
    if address.len() > MAX_PEER_URL_LENGTH {
        return Err(ChainError::InvalidPeer(format!(
            "address exceeds {} characters",
            MAX_PEER_URL_LENGTH
        )));
    }
    if !address.starts_with("http://") && !address.starts_with("https://") {
        return Err(ChainError::InvalidPeer(format!(
            "address must be an http(s) base URL, got {:?}",
            address
        )));
    }
    Ok(())
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peer address. Returns whether the set changed.
    pub fn add(&self, address: &str) -> Result<bool, ChainError> {
        let address = normalize(address);
        validate(&address)?;
        Ok(self.inner.write().insert(address))
    }

    /// Remove a peer address. Returns whether it was present.
    pub fn remove(&self, address: &str) -> bool {
        self.inner.write().remove(&normalize(address))
    }

    pub fn contains(&self, address: &str) -> bool {
        self.inner.read().contains(&normalize(address))
    }

    /// Snapshot of all known peers, self included.
    pub fn all(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.inner.read().iter().cloned().collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let registry = PeerRegistry::new();
        assert!(registry.add("http://127.0.0.1:8001").unwrap());
        assert!(registry.add("http://127.0.0.1:8002").unwrap());
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("http://127.0.0.1:8001"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let registry = PeerRegistry::new();
        assert!(registry.add("http://127.0.0.1:8001").unwrap());
        assert!(!registry.add("http://127.0.0.1:8001").unwrap());
        assert!(!registry.add("http://127.0.0.1:8001/").unwrap());
        assert!(!registry.add("  http://127.0.0.1:8001 ").unwrap());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_malformed_addresses_rejected() {
        let registry = PeerRegistry::new();
        assert!(registry.add("").is_err());
        assert!(registry.add("127.0.0.1:8001").is_err());
        assert!(registry.add("ftp://example.com").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove() {
        let registry = PeerRegistry::new();
        registry.add("http://127.0.0.1:8001").unwrap();
        assert!(registry.remove("http://127.0.0.1:8001/"));
        assert!(!registry.remove("http://127.0.0.1:8001"));
        assert!(registry.is_empty());
    }
}
