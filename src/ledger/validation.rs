use crate::error::ChainError;
use crate::ledger::chain::{genesis_block, meets_difficulty, Block, GENESIS_PREVIOUS_HASH};

fn invalid(index: u64, reason: impl Into<String>) -> ChainError {
    ChainError::InvalidBlock {
        index,
        reason: reason.into(),
    }
}

/// Validate a full block sequence from genesis to tip.
///
/// Checks, in order per block: stored hash matches its recomputation (which
/// also catches any tampered transaction byte, since transactions feed the
/// hash), the proof-of-work predicate, and linkage to the predecessor. The
/// first failing block is named in the error. Genesis is held to byte-exact
/// equality with the pinned genesis block instead of the difficulty predicate.
pub fn validate_chain(blocks: &[Block], difficulty: u32) -> Result<(), ChainError> {
    let first = blocks
        .first()
        .ok_or_else(|| invalid(0, "Chain is empty; genesis block required"))?;

    if first.index != 0 {
        return Err(invalid(first.index, "First block must have index 0"));
    }
    if first.previous_hash != GENESIS_PREVIOUS_HASH {
        return Err(invalid(0, "Genesis previous hash must be the zero sentinel"));
    }
    if *first != genesis_block() {
        return Err(invalid(0, "Genesis block does not match the pinned genesis"));
    }

    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);

        let recomputed = block.compute_hash();
        if recomputed != block.hash {
            return Err(invalid(
                block.index,
                format!(
                    "Stored hash {} does not match recomputed hash {}",
                    hex::encode(block.hash),
                    hex::encode(recomputed)
                ),
            ));
        }

        if !meets_difficulty(&block.hash, difficulty) {
            return Err(invalid(
                block.index,
                format!(
                    "Hash {} does not meet difficulty {}",
                    hex::encode(block.hash),
                    difficulty
                ),
            ));
        }

        if block.index != prev.index + 1 {
            return Err(invalid(
                block.index,
                format!("Expected index {}, got {}", prev.index + 1, block.index),
            ));
        }

        if block.previous_hash != prev.hash {
            return Err(invalid(
                block.index,
                format!(
                    "Previous hash {} does not match predecessor hash {}",
                    hex::encode(block.previous_hash),
                    hex::encode(prev.hash)
                ),
            ));
        }
    }

    Ok(())
}
