//! Error types for custodychain

use std::fmt;

#[derive(Debug, Clone)]
pub enum ChainError {
    EmptyBatch,
    AssetAlreadyExists(String),
    AssetNotFound(String),
    OwnershipMismatch {
        asset_id: String,
        claimed: String,
        actual: String,
    },
    InvalidTransaction(String),
    InvalidPeer(String),
    InvalidBlock { index: u64, reason: String },
    MiningFailed(String),
    NetworkError(String),
    DatabaseError(String),
    ConfigError(String),
    IoError(String),
    BincodeError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::EmptyBatch => write!(f, "Cannot mine a block from an empty transaction batch"),
            ChainError::AssetAlreadyExists(id) => write!(f, "Asset already exists: {}", id),
            ChainError::AssetNotFound(id) => write!(f, "Asset not found: {}", id),
            ChainError::OwnershipMismatch { asset_id, claimed, actual } => write!(
                f,
                "Ownership mismatch for asset {}: claimed owner {} but current owner is {}",
                asset_id, claimed, actual
            ),
            ChainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            ChainError::InvalidPeer(msg) => write!(f, "Invalid peer address: {}", msg),
            ChainError::InvalidBlock { index, reason } => {
                write!(f, "Invalid block at index {}: {}", index, reason)
            }
            ChainError::MiningFailed(msg) => write!(f, "Mining failed: {}", msg),
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::BincodeError(msg) => write!(f, "Bincode error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::BincodeError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
