//! Database persistence layer for custodychain
//!
//! The persisted layout is exactly the chain's block sequence; everything
//! else (world state, peer set) is derived or rebuilt at startup. Persistence
//! failures after a successful in-memory append are logged by callers and
//! never abort the node.

use crate::error::ChainError;
use crate::ledger::{Block, Sha256Hash};
use crate::transaction::Transaction;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::Mutex;

/// Abstraction for persistence backends. Implementations provide atomic
/// saving/loading of the block sequence.
pub trait Persistence: Send + Sync {
    fn save_block(&self, block: &Block) -> Result<(), ChainError>;
    fn replace_chain(&self, blocks: &[Block]) -> Result<(), ChainError>;
    fn load_chain(&self) -> Result<Vec<Block>, ChainError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, ChainError> {
        let conn = Connection::open(path)
            .map_err(|e| ChainError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                idx INTEGER PRIMARY KEY,
                hash BLOB NOT NULL,
                previous_hash BLOB NOT NULL,
                nonce INTEGER NOT NULL,
                transactions TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn insert_block(conn: &Connection, block: &Block) -> Result<(), ChainError> {
        let transactions_json = serde_json::to_string(&block.transactions).map_err(|e| {
            ChainError::DatabaseError(format!("Failed to serialize transactions: {}", e))
        })?;

        conn.execute(
            "INSERT OR REPLACE INTO blocks (idx, hash, previous_hash, nonce, transactions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                block.index as i64,
                block.hash.to_vec(),
                block.previous_hash.to_vec(),
                block.nonce as i64,
                transactions_json,
            ],
        )
        .map_err(|e| ChainError::DatabaseError(format!("Failed to save block: {}", e)))?;

        Ok(())
    }
}

fn hash_from_bytes(bytes: Vec<u8>) -> Result<Sha256Hash, ChainError> {
    bytes
        .try_into()
        .map_err(|_| ChainError::DatabaseError("Stored hash is not 32 bytes".to_string()))
}

impl Persistence for Database {
    fn save_block(&self, block: &Block) -> Result<(), ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        Self::insert_block(&conn, block)
    }

    fn replace_chain(&self, blocks: &[Block]) -> Result<(), ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn.unchecked_transaction().map_err(|e| {
            ChainError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute("DELETE FROM blocks", [])
            .map_err(|e| ChainError::DatabaseError(format!("Failed to clear blocks: {}", e)))?;
        for block in blocks {
            Self::insert_block(&tx, block)?;
        }

        tx.commit()
            .map_err(|e| ChainError::DatabaseError(format!("Failed to commit transaction: {}", e)))
    }

    fn load_chain(&self) -> Result<Vec<Block>, ChainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;

        let mut stmt = conn
            .prepare("SELECT idx, hash, previous_hash, nonce, transactions FROM blocks ORDER BY idx ASC")
            .map_err(|e| ChainError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let index: i64 = row.get(0)?;
                let hash: Vec<u8> = row.get(1)?;
                let previous_hash: Vec<u8> = row.get(2)?;
                let nonce: i64 = row.get(3)?;
                let transactions_json: String = row.get(4)?;
                Ok((index, hash, previous_hash, nonce, transactions_json))
            })
            .map_err(|e| ChainError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for row in rows {
            let (index, hash, previous_hash, nonce, transactions_json) =
                row.map_err(|e| ChainError::DatabaseError(format!("Failed to read row: {}", e)))?;

            let transactions: Vec<Transaction> =
                serde_json::from_str(&transactions_json).map_err(|e| {
                    ChainError::DatabaseError(format!("Failed to deserialize transactions: {}", e))
                })?;

            blocks.push(Block {
                index: index as u64,
                previous_hash: hash_from_bytes(previous_hash)?,
                nonce: nonce as u64,
                transactions,
                hash: hash_from_bytes(hash)?,
            });
        }

        Ok(blocks)
    }
}

/// In-memory backend used by tests and as a fallback when the database
/// cannot be opened.
#[derive(Default)]
pub struct InMemoryPersistence {
    blocks: Mutex<HashMap<u64, Block>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_block(&self, block: &Block) -> Result<(), ChainError> {
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        blocks.insert(block.index, block.clone());
        Ok(())
    }

    fn replace_chain(&self, chain: &[Block]) -> Result<(), ChainError> {
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        blocks.clear();
        for block in chain {
            blocks.insert(block.index, block.clone());
        }
        Ok(())
    }

    fn load_chain(&self) -> Result<Vec<Block>, ChainError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| ChainError::DatabaseError("Mutex poisoned".to_string()))?;
        let mut chain: Vec<Block> = blocks.values().cloned().collect();
        chain.sort_by_key(|b| b.index);
        Ok(chain)
    }
}
