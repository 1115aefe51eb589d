/// Transaction types for custodychain
use crate::error::ChainError;
use crate::ledger::Sha256Hash;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum serialized transaction size in bytes to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 16_384;

/// Maximum asset identifier length
pub const MAX_ASSET_ID_LENGTH: usize = 128;

/// Maximum party name length
pub const MAX_PARTY_LENGTH: usize = 128;

/// Maximum metadata length
pub const MAX_META_LENGTH: usize = 512;

/// The two custody events a transaction can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxEvent {
    Create,
    Transfer,
}

/// An immutable record of one custody event.
///
/// `from_party` is empty for CREATE events. The canonical byte encoding used
/// for hashing is field-by-field with length prefixes, so two transactions
/// hash equal exactly when every field is equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub event: TxEvent,
    pub asset_id: String,
    #[serde(default)]
    pub from_party: String,
    pub to_party: String,
    #[serde(default)]
    pub meta: String,
}

impl Transaction {
    /// Build a CREATE transaction: `owner` takes initial custody of `asset_id`.
    pub fn create(
        asset_id: impl Into<String>,
        owner: impl Into<String>,
        meta: impl Into<String>,
    ) -> Self {
        Transaction {
            event: TxEvent::Create,
            asset_id: asset_id.into(),
            from_party: String::new(),
            to_party: owner.into(),
            meta: meta.into(),
        }
    }

    /// Build a TRANSFER transaction: custody of `asset_id` moves from `from` to `to`.
    pub fn transfer(
        asset_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        meta: impl Into<String>,
    ) -> Self {
        Transaction {
            event: TxEvent::Transfer,
            asset_id: asset_id.into(),
            from_party: from.into(),
            to_party: to.into(),
            meta: meta.into(),
        }
    }

    /// Deterministic byte encoding fed into block and transaction hashing.
    ///
    /// Layout: event tag byte, then each string field as u32 LE length prefix
    /// followed by UTF-8 bytes, in declaration order. Length prefixes keep
    /// adjacent variable-length fields from aliasing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 16 + self.asset_id.len() + self.from_party.len() + self.to_party.len() + self.meta.len(),
        );
        buf.push(match self.event {
            TxEvent::Create => 0u8,
            TxEvent::Transfer => 1u8,
        });
        for field in [&self.asset_id, &self.from_party, &self.to_party, &self.meta] {
            buf.extend_from_slice(&(field.len() as u32).to_le_bytes());
            buf.extend_from_slice(field.as_bytes());
        }
        buf
    }

    /// Calculate the hash of this transaction.
    ///
    /// Doubles as the gossip idempotency token: a transaction already mined
    /// into the chain is recognized by this hash and ignored on re-delivery.
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
