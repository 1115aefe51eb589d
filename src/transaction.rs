//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;
// validation module kept internal; only types are re-exported publicly

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;
    use crate::ledger::WorldState;

    #[test]
    fn test_create_factory_leaves_from_party_empty() {
        let tx = Transaction::create("SKU-1", "alice", "initial intake");
        assert_eq!(tx.event, TxEvent::Create);
        assert_eq!(tx.asset_id, "SKU-1");
        assert!(tx.from_party.is_empty());
        assert_eq!(tx.to_party, "alice");
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_transfer_factory_sets_both_parties() {
        let tx = Transaction::transfer("SKU-1", "alice", "bob", "");
        assert_eq!(tx.event, TxEvent::Transfer);
        assert_eq!(tx.from_party, "alice");
        assert_eq!(tx.to_party, "bob");
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_hash_is_deterministic_and_field_sensitive() {
        let a = Transaction::create("SKU-1", "alice", "m");
        let b = Transaction::create("SKU-1", "alice", "m");
        assert_eq!(a.hash(), b.hash());

        let c = Transaction::create("SKU-1", "alice", "n");
        assert_ne!(a.hash(), c.hash());

        // Adjacent fields must not alias under concatenation
        let d = Transaction::create("SKU-1a", "lice", "m");
        assert_ne!(a.hash(), d.hash());
    }

    #[test]
    fn test_hash_str_is_hex() {
        let tx = Transaction::create("SKU-1", "alice", "");
        let s = tx.hash_str();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_asset_id_rejected() {
        let tx = Transaction::create("", "alice", "");
        assert!(matches!(tx.validate(), Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_create_with_sender_rejected() {
        let tx = Transaction {
            event: TxEvent::Create,
            asset_id: "SKU-1".to_string(),
            from_party: "mallory".to_string(),
            to_party: "alice".to_string(),
            meta: String::new(),
        };
        assert!(matches!(tx.validate(), Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_transfer_without_sender_rejected() {
        let tx = Transaction {
            event: TxEvent::Transfer,
            asset_id: "SKU-1".to_string(),
            from_party: String::new(),
            to_party: "bob".to_string(),
            meta: String::new(),
        };
        assert!(matches!(tx.validate(), Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_self_transfer_rejected() {
        let tx = Transaction::transfer("SKU-1", "alice", "alice", "");
        assert!(matches!(tx.validate(), Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_overlong_meta_rejected() {
        let tx = Transaction::create("SKU-1", "alice", "x".repeat(MAX_META_LENGTH + 1));
        assert!(matches!(tx.validate(), Err(ChainError::InvalidTransaction(_))));
    }

    #[test]
    fn test_validate_with_state_duplicate_create() {
        let mut world = WorldState::default();
        world.apply(&Transaction::create("SKU-1", "alice", "")).unwrap();

        let dup = Transaction::create("SKU-1", "bob", "");
        assert!(matches!(
            dup.validate_with_state(&world),
            Err(ChainError::AssetAlreadyExists(_))
        ));
    }

    #[test]
    fn test_validate_with_state_unknown_asset() {
        let world = WorldState::default();
        let tx = Transaction::transfer("SKU-404", "alice", "bob", "");
        assert!(matches!(
            tx.validate_with_state(&world),
            Err(ChainError::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_validate_with_state_wrong_owner() {
        let mut world = WorldState::default();
        world.apply(&Transaction::create("SKU-1", "alice", "")).unwrap();

        let tx = Transaction::transfer("SKU-1", "bob", "carol", "");
        match tx.validate_with_state(&world) {
            Err(ChainError::OwnershipMismatch { asset_id, claimed, actual }) => {
                assert_eq!(asset_id, "SKU-1");
                assert_eq!(claimed, "bob");
                assert_eq!(actual, "alice");
            }
            other => panic!("Expected OwnershipMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_wire_event_vocabulary() {
        let tx = Transaction::create("SKU-1", "alice", "");
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"CREATE\""));

        let parsed: Transaction = serde_json::from_str(
            r#"{"event":"TRANSFER","asset_id":"SKU-1","from_party":"alice","to_party":"bob","meta":""}"#,
        )
        .unwrap();
        assert_eq!(parsed.event, TxEvent::Transfer);
    }

    #[test]
    fn test_validate_size_accepts_normal_transactions() {
        let tx = Transaction::create("SKU-1", "alice", "pallet 7, dock B");
        assert!(tx.validate_size().is_ok());
    }
}
