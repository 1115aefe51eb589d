use crate::error::ChainError;
use crate::ledger::chain::Ledger;
use crate::transaction::{Transaction, TxEvent};
use std::collections::{BTreeSet, HashMap};

/// Current-ownership projection derived from the chain.
///
/// `owners` maps each asset to its current custodian; `inventories` is the
/// inverse index. Both are caches: a fresh replay of the ledger always wins
/// over whatever this struct holds.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct WorldState {
    pub owners: HashMap<String, String>,
    pub inventories: HashMap<String, BTreeSet<String>>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, asset_id: &str) -> Option<&str> {
        self.owners.get(asset_id).map(String::as_str)
    }

    pub fn inventory_of(&self, owner: &str) -> BTreeSet<String> {
        self.inventories.get(owner).cloned().unwrap_or_default()
    }

    /// Apply one transaction to the projection.
    ///
    /// This is the single transition function: live appends and full replay
    /// both go through it, so incremental and replayed state cannot diverge.
    /// Violations are reported as errors; replay downgrades them to rejected
    /// entries instead of aborting.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        match tx.event {
            TxEvent::Create => {
                if let Some(owner) = self.owners.get(&tx.asset_id) {
                    return Err(ChainError::InvalidTransaction(format!(
                        "Duplicate CREATE for asset {} already owned by {}",
                        tx.asset_id, owner
                    )));
                }
                self.owners.insert(tx.asset_id.clone(), tx.to_party.clone());
                self.inventories
                    .entry(tx.to_party.clone())
                    .or_default()
                    .insert(tx.asset_id.clone());
            }
            TxEvent::Transfer => {
                let owner = self.owners.get(&tx.asset_id).ok_or_else(|| {
                    ChainError::InvalidTransaction(format!(
                        "TRANSFER of unknown asset {}",
                        tx.asset_id
                    ))
                })?;
                if *owner != tx.from_party {
                    return Err(ChainError::InvalidTransaction(format!(
                        "TRANSFER of asset {} from {} but current owner is {}",
                        tx.asset_id, tx.from_party, owner
                    )));
                }

                if let Some(assets) = self.inventories.get_mut(&tx.from_party) {
                    assets.remove(&tx.asset_id);
                    if assets.is_empty() {
                        self.inventories.remove(&tx.from_party);
                    }
                }
                self.owners.insert(tx.asset_id.clone(), tx.to_party.clone());
                self.inventories
                    .entry(tx.to_party.clone())
                    .or_default()
                    .insert(tx.asset_id.clone());
            }
        }
        Ok(())
    }
}

/// A historical transaction whose effect was excluded during replay.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RejectedEntry {
    pub height: u64,
    pub transaction: Transaction,
    pub reason: String,
}

/// Result of projecting a ledger: the world state plus every entry that was
/// rejected in hindsight.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub world: WorldState,
    pub rejected: Vec<RejectedEntry>,
}

/// Deterministic full replay of the ledger, block order, earliest first.
///
/// An invariant violation never aborts the replay: the offending transaction
/// is recorded as rejected, its effect skipped, and the replay continues. A
/// single bad historical entry, possibly supplied by a misbehaving peer, must
/// not brick the node.
pub fn project(ledger: &Ledger) -> Projection {
    let mut projection = Projection::default();
    for block in ledger.blocks() {
        for tx in &block.transactions {
            if let Err(err) = projection.world.apply(tx) {
                projection.rejected.push(RejectedEntry {
                    height: block.index,
                    transaction: tx.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    projection
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_transfer() {
        let mut world = WorldState::new();
        world.apply(&Transaction::create("SKU-1", "alice", "")).unwrap();
        assert_eq!(world.owner_of("SKU-1"), Some("alice"));

        world
            .apply(&Transaction::transfer("SKU-1", "alice", "bob", ""))
            .unwrap();
        assert_eq!(world.owner_of("SKU-1"), Some("bob"));
        assert!(world.inventory_of("alice").is_empty());
        assert!(world.inventory_of("bob").contains("SKU-1"));
    }

    #[test]
    fn test_duplicate_create_fails() {
        let mut world = WorldState::new();
        world.apply(&Transaction::create("SKU-1", "alice", "")).unwrap();
        assert!(world.apply(&Transaction::create("SKU-1", "bob", "")).is_err());
        // The failed apply must not disturb the projection
        assert_eq!(world.owner_of("SKU-1"), Some("alice"));
    }

    #[test]
    fn test_transfer_from_non_owner_fails() {
        let mut world = WorldState::new();
        world.apply(&Transaction::create("SKU-1", "alice", "")).unwrap();
        assert!(world
            .apply(&Transaction::transfer("SKU-1", "bob", "carol", ""))
            .is_err());
        assert_eq!(world.owner_of("SKU-1"), Some("alice"));
    }

    #[test]
    fn test_replay_determinism() {
        // Applying transactions one at a time must match a full projection
        // of the mined chain.
        let txs = vec![
            Transaction::create("SKU-1", "alice", ""),
            Transaction::create("SKU-2", "bob", ""),
            Transaction::transfer("SKU-1", "alice", "bob", ""),
            Transaction::transfer("SKU-2", "bob", "carol", ""),
        ];

        let mut incremental = WorldState::new();
        let mut ledger = Ledger::new(1);
        for tx in &txs {
            incremental.apply(tx).unwrap();
            ledger.mine_and_append(vec![tx.clone()]).unwrap();
        }

        let projection = project(&ledger);
        assert!(projection.rejected.is_empty());
        assert_eq!(projection.world.owners, incremental.owners);
        assert_eq!(projection.world.inventories, incremental.inventories);
    }

    #[test]
    fn test_projection_rejects_bad_history_and_continues() {
        // Mine a chain whose history contains an ownership violation; the
        // projector must skip it, report it, and keep replaying.
        let mut ledger = Ledger::new(1);
        ledger
            .mine_and_append(vec![Transaction::create("SKU-1", "alice", "")])
            .unwrap();
        ledger
            .mine_and_append(vec![Transaction::transfer("SKU-1", "mallory", "eve", "")])
            .unwrap();
        ledger
            .mine_and_append(vec![Transaction::transfer("SKU-1", "alice", "bob", "")])
            .unwrap();

        let projection = project(&ledger);
        assert_eq!(projection.rejected.len(), 1);
        assert_eq!(projection.rejected[0].height, 2);
        assert_eq!(projection.world.owner_of("SKU-1"), Some("bob"));
    }

    #[test]
    fn test_empty_inventory_entries_are_dropped() {
        let mut world = WorldState::new();
        world.apply(&Transaction::create("SKU-1", "alice", "")).unwrap();
        world
            .apply(&Transaction::transfer("SKU-1", "alice", "bob", ""))
            .unwrap();
        assert!(!world.inventories.contains_key("alice"));
    }
}
