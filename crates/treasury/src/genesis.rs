//! Genesis import and export of the full treasury state as JSON.

use crate::errors::{Result, TreasuryError};
use crate::state::TreasuryState;
use std::path::Path;
use tracing::info;

/// Parse and validate a genesis document.
pub fn import_genesis(json: &str) -> Result<TreasuryState> {
    let state: TreasuryState = serde_json::from_str(json)
        .map_err(|e| TreasuryError::Config(format!("Failed to parse genesis: {e}")))?;
    state.validate()?;
    info!(
        target: "treasury",
        "Imported genesis: freeze deadline {}, {} name holder(s), {} saver(s)",
        state.freeze_deadline,
        state.name.shares().participant_count(),
        state.savings.shares().participant_count()
    );
    Ok(state)
}

pub fn load_genesis<P: AsRef<Path>>(path: P) -> Result<TreasuryState> {
    let content = std::fs::read_to_string(path.as_ref())
        .map_err(|e| TreasuryError::Config(format!("Failed to read genesis file: {e}")))?;
    import_genesis(&content)
}

pub fn export_genesis(state: &TreasuryState) -> Result<String> {
    state.validate()?;
    serde_json::to_string_pretty(state)
        .map_err(|e| TreasuryError::Corrupted(format!("Failed to serialize state: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{Address, Timestamp};

    #[test]
    fn test_export_import_preserves_state() {
        let mut state = TreasuryState::new(Timestamp(500));
        state.name.schedule(Address([1; 32]), Timestamp(40));
        state.savings.commit_deposit(Address([2; 32]), 77).unwrap();
        state.savings.distribute(10).unwrap();

        let json = export_genesis(&state).unwrap();
        assert!(json.contains("\"global_rate\""));
        assert_eq!(import_genesis(&json).unwrap(), state);
    }

    #[test]
    fn test_import_rejects_inconsistent_stake() {
        let mut state = TreasuryState::new(Timestamp(0));
        state.savings.commit_deposit(Address([2; 32]), 77).unwrap();
        let json = export_genesis(&state).unwrap();
        let tampered = json.replacen("\"total_stake\": 77", "\"total_stake\": 78", 1);
        assert_ne!(json, tampered);

        let err = import_genesis(&tampered).unwrap_err();
        assert!(matches!(err, TreasuryError::Corrupted(_)));
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            import_genesis("{ not json"),
            Err(TreasuryError::Config(_))
        ));
    }
}
