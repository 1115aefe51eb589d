use crate::error::ChainError;
use crate::transaction::Transaction;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// Sentinel previous-hash of the genesis block
pub const GENESIS_PREVIOUS_HASH: Sha256Hash = [0u8; 32];

/// A sealed, hash-linked batch of custody transactions.
///
/// The stored `hash` is authoritative on the wire; `validate` recomputes it
/// from the other fields and rejects any mismatch. There is no timestamp:
/// identical inputs must produce bit-identical blocks on every node.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: Sha256Hash,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
    pub hash: Sha256Hash,
}

impl Block {
    /// Unsealed successor block; `mine_block` fills in nonce and hash.
    pub fn new(index: u64, previous_hash: Sha256Hash, transactions: Vec<Transaction>) -> Self {
        Block {
            index,
            previous_hash,
            nonce: 0,
            transactions,
            hash: [0u8; 32],
        }
    }

    /// Recompute this block's hash from its fields.
    pub fn compute_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update(self.nonce.to_le_bytes());
        for tx in &self.transactions {
            hasher.update(tx.canonical_bytes());
        }
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }
}

static GENESIS: Lazy<Block> = Lazy::new(|| {
    let mut block = Block::new(0, GENESIS_PREVIOUS_HASH, Vec::new());
    block.hash = block.compute_hash();
    block
});

/// The fixed first block shared by every chain: index 0, zero sentinel
/// previous hash, nonce 0, no transactions. Not mined, so it is exempt from
/// the difficulty predicate; validation pins it by exact recomputation.
pub fn genesis_block() -> Block {
    GENESIS.clone()
}

/// Number of leading zero hex digits (nibbles) of a hash. The proof-of-work
/// predicate requires at least `difficulty` of them.
pub fn leading_zero_digits(hash: &Sha256Hash) -> u32 {
    let mut digits = 0;
    for byte in hash {
        if byte >> 4 != 0 {
            return digits;
        }
        digits += 1;
        if byte & 0x0f != 0 {
            return digits;
        }
        digits += 1;
    }
    digits
}

pub fn meets_difficulty(hash: &Sha256Hash, difficulty: u32) -> bool {
    leading_zero_digits(hash) >= difficulty
}

fn leading_zero_bits(hash: &Sha256Hash) -> u32 {
    let mut bits = 0;
    for byte in hash {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}

/// Work contributed by one block: 2^(leading zero bits), saturating.
pub fn block_work(hash: &Sha256Hash) -> u128 {
    1u128
        .checked_shl(leading_zero_bits(hash))
        .unwrap_or(u128::MAX)
}

/// Cumulative adoption score of a chain. Scores compare work, never length:
/// a short chain of lucky hashes outranks a long chain of barely-passing ones.
pub fn chain_work(blocks: &[Block]) -> u128 {
    blocks
        .iter()
        .fold(0u128, |acc, b| acc.saturating_add(block_work(&b.hash)))
}

/// Seal a block by searching nonce values from 0 upward until the hash meets
/// the difficulty predicate.
pub fn mine_block(mut block: Block, difficulty: u32) -> Result<Block, ChainError> {
    for nonce in 0..=u64::MAX {
        block.nonce = nonce;
        let hash = block.compute_hash();
        if meets_difficulty(&hash, difficulty) {
            block.hash = hash;
            return Ok(block);
        }
    }
    Err(ChainError::MiningFailed(format!(
        "Nonce space exhausted at difficulty {}",
        difficulty
    )))
}

/// The append-only chain of blocks. Sole source of truth for the node; the
/// ownership projection is derived from it and rebuildable at any time.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
    difficulty: u32,
}

impl Ledger {
    /// Fresh genesis-only chain at the given difficulty.
    pub fn new(difficulty: u32) -> Self {
        Ledger {
            blocks: vec![genesis_block()],
            difficulty,
        }
    }

    /// Rehydrate a chain from stored or peer-supplied blocks.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: u32) -> Result<Self, ChainError> {
        crate::ledger::validation::validate_chain(&blocks, difficulty)?;
        Ok(Ledger { blocks, difficulty })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn tip(&self) -> &Block {
        // Invariant: the chain always holds at least the genesis block
        self.blocks.last().expect("chain never empty")
    }

    /// Read-only snapshot of the full block sequence.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Chain height counted in blocks, genesis included.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn work(&self) -> u128 {
        chain_work(&self.blocks)
    }

    /// Mine the given batch into the next block on the current tip and
    /// append it. The append is atomic: the chain is untouched on error.
    pub fn mine_and_append(&mut self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        if transactions.is_empty() {
            return Err(ChainError::EmptyBatch);
        }

        let tip = self.tip();
        let block = Block::new(tip.index + 1, tip.hash, transactions);
        let sealed = mine_block(block, self.difficulty)?;
        self.blocks.push(sealed.clone());
        Ok(sealed)
    }

    /// Check a candidate block sequence end-to-end: stored hashes match their
    /// recomputation, proof-of-work holds, linkage is correct from genesis.
    /// Never mutates; the error names the first offending block.
    pub fn validate(&self, blocks: &[Block]) -> Result<(), ChainError> {
        crate::ledger::validation::validate_chain(blocks, self.difficulty)
    }

    /// Replace the local chain with `candidate` if it validates and its
    /// cumulative work strictly exceeds ours. Returns whether adoption
    /// occurred; an invalid candidate is an error and leaves us untouched.
    pub fn adopt(&mut self, candidate: Vec<Block>) -> Result<bool, ChainError> {
        self.validate(&candidate)?;

        if chain_work(&candidate) <= self.work() {
            return Ok(false);
        }

        self.blocks = candidate;
        Ok(true)
    }
}
