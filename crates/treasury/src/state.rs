use crate::errors::{Result, TreasuryError};
use crate::name_pool::NamePool;
use crate::savings_pool::SavingsPool;
use crate::validator_pool::ValidatorRewards;
use serde::{Deserialize, Serialize};
use tally_types::Timestamp;

/// Everything the treasury owns. One value per engine instance; nothing is
/// held in process-wide statics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryState {
    /// Payouts before this time are escrowed. Set at genesis, never changed.
    pub freeze_deadline: Timestamp,
    /// Time of the last block processed by `begin_block`.
    pub block_time: Timestamp,
    pub name: NamePool,
    pub savings: SavingsPool,
    pub validators: ValidatorRewards,
}

impl TreasuryState {
    pub fn new(freeze_deadline: Timestamp) -> Self {
        Self {
            freeze_deadline,
            ..Self::default()
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.block_time < self.freeze_deadline
    }

    pub fn validate(&self) -> Result<()> {
        self.name
            .validate()
            .map_err(|e| TreasuryError::Corrupted(format!("name pool: {e}")))?;
        self.savings
            .validate()
            .map_err(|e| TreasuryError::Corrupted(format!("savings pool: {e}")))?;
        self.validators
            .validate()
            .map_err(|e| TreasuryError::Corrupted(format!("validator rewards: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_until_deadline() {
        let mut state = TreasuryState::new(Timestamp(100));
        assert!(state.is_frozen());
        state.block_time = Timestamp(99);
        assert!(state.is_frozen());
        state.block_time = Timestamp(100);
        assert!(!state.is_frozen());
    }

    #[test]
    fn test_default_state_is_valid() {
        TreasuryState::new(Timestamp(0)).validate().unwrap();
    }
}
