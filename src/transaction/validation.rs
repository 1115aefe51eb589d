/// Validation logic for transactions separated from type definitions
use crate::error::ChainError;
use crate::ledger::WorldState;
use crate::transaction::types::{
    Transaction, TxEvent, MAX_ASSET_ID_LENGTH, MAX_META_LENGTH, MAX_PARTY_LENGTH,
};

impl Transaction {
    /// Stateless validation: field shape only, no access to chain state.
    /// Useful for rejecting malformed peer payloads before touching the ledger.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.asset_id.trim().is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Asset id cannot be empty".to_string(),
            ));
        }
        if self.asset_id.len() > MAX_ASSET_ID_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Asset id exceeds maximum length of {} characters",
                MAX_ASSET_ID_LENGTH
            )));
        }
        if self.to_party.trim().is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Receiving party cannot be empty".to_string(),
            ));
        }
        if self.to_party.len() > MAX_PARTY_LENGTH || self.from_party.len() > MAX_PARTY_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Party name exceeds maximum length of {} characters",
                MAX_PARTY_LENGTH
            )));
        }
        if self.meta.len() > MAX_META_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Meta exceeds maximum length of {} characters",
                MAX_META_LENGTH
            )));
        }

        match self.event {
            TxEvent::Create => {
                if !self.from_party.is_empty() {
                    return Err(ChainError::InvalidTransaction(
                        "CREATE must not name a sending party".to_string(),
                    ));
                }
            }
            TxEvent::Transfer => {
                if self.from_party.trim().is_empty() {
                    return Err(ChainError::InvalidTransaction(
                        "TRANSFER must name a sending party".to_string(),
                    ));
                }
                if self.from_party == self.to_party {
                    return Err(ChainError::InvalidTransaction(
                        "Sending and receiving party cannot be the same".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Full validation including the current ownership projection.
    ///
    /// The same rules run again during world-state replay, so a transaction
    /// that slips past this check is still caught there.
    pub fn validate_with_state(&self, world: &WorldState) -> Result<(), ChainError> {
        self.validate()?;

        match self.event {
            TxEvent::Create => {
                if world.owner_of(&self.asset_id).is_some() {
                    return Err(ChainError::AssetAlreadyExists(self.asset_id.clone()));
                }
            }
            TxEvent::Transfer => {
                let owner = world
                    .owner_of(&self.asset_id)
                    .ok_or_else(|| ChainError::AssetNotFound(self.asset_id.clone()))?;
                if owner != self.from_party {
                    return Err(ChainError::OwnershipMismatch {
                        asset_id: self.asset_id.clone(),
                        claimed: self.from_party.clone(),
                        actual: owner.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
