use crate::error::ChainError;
use crate::ledger::chain::{Block, Ledger, Sha256Hash};
use crate::ledger::state::{project, RejectedEntry, WorldState};
use crate::transaction::Transaction;
use std::collections::HashSet;

/// The node's chain plus everything derived from it, kept consistent as one
/// unit. A node wraps this in a single `tokio::sync::RwLock`: one mutation in
/// flight at a time, and readers observe either the pre- or post-mutation
/// state, never a half-applied block.
pub struct ChainStore {
    ledger: Ledger,
    world: WorldState,
    rejected: Vec<RejectedEntry>,
    applied: HashSet<Sha256Hash>,
}

impl ChainStore {
    pub fn new(difficulty: u32) -> Self {
        ChainStore {
            ledger: Ledger::new(difficulty),
            world: WorldState::new(),
            rejected: Vec::new(),
            applied: HashSet::new(),
        }
    }

    /// Rehydrate from stored blocks, validating and re-projecting.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Result<Self, ChainError> {
        let ledger = Ledger::from_blocks(blocks, difficulty)?;
        let projection = project(&ledger);
        let applied = applied_ids(&ledger);
        Ok(ChainStore {
            ledger,
            world: projection.world,
            rejected: projection.rejected,
            applied,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    /// Whether a transaction with this hash is already mined into the chain.
    pub fn contains_transaction(&self, id: &Sha256Hash) -> bool {
        self.applied.contains(id)
    }

    /// Validate, mine, and append a batch, updating the projection.
    ///
    /// The world transition is staged on a clone first (the ledger only mines
    /// once every transaction in the batch is known to apply), so a rejected
    /// batch leaves chain and projection untouched.
    pub fn commit(&mut self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        if transactions.is_empty() {
            return Err(ChainError::EmptyBatch);
        }

        let mut staged = self.world.clone();
        for tx in &transactions {
            tx.validate_size()?;
            tx.validate_with_state(&staged)?;
            staged.apply(tx)?;
        }

        let block = self.ledger.mine_and_append(transactions)?;
        self.world = staged;
        for tx in &block.transactions {
            self.applied.insert(tx.hash());
        }
        Ok(block)
    }

    /// Adopt a peer chain if it validates and strictly outworks ours, then
    /// rebuild every derived structure from the new chain.
    pub fn adopt(&mut self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        if !self.ledger.adopt(candidate)? {
            return Ok(false);
        }

        let projection = project(&self.ledger);
        self.world = projection.world;
        self.rejected = projection.rejected;
        self.applied = applied_ids(&self.ledger);
        Ok(true)
    }
}

fn applied_ids(ledger: &Ledger) -> HashSet<Sha256Hash> {
    ledger
        .blocks()
        .iter()
        .flat_map(|b| b.transactions.iter().map(Transaction::hash))
        .collect()
}
