use tally_storage::StorageError;
use tally_types::{Address, AmountError, Timestamp};
use thiserror::Error;

/// Errors returned by treasury operations.
///
/// Precondition failures and collaborator failures abort only the triggering
/// operation. Everything reported by [`TreasuryError::is_fatal`] means the
/// local state can no longer be trusted and the node must halt.
#[derive(Debug, Error)]
pub enum TreasuryError {
    #[error("{address} is not enrolled")]
    NotEnrolled { address: Address },

    #[error("{address} is already enrolled")]
    AlreadyEnrolled { address: Address },

    #[error("withdrawals are frozen until {deadline}")]
    WithdrawalFrozen { deadline: Timestamp },

    #[error("no whole-unit reward accumulated for {address}")]
    NoAccumulatedReward { address: Address },

    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("token transfer failed: {0}")]
    Transfer(#[source] anyhow::Error),

    #[error("arithmetic failure: {0}")]
    Arithmetic(#[from] AmountError),

    #[error("corrupted treasury state: {0}")]
    Corrupted(String),

    #[error("treasury invariant violated: {0}")]
    Invariant(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TreasuryError {
    /// Whether the error signals corrupted state rather than a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TreasuryError::Arithmetic(_)
                | TreasuryError::Corrupted(_)
                | TreasuryError::Invariant(_)
                | TreasuryError::Storage(_)
        )
    }

    /// Promote an error raised inside the per-block driver. Those paths are
    /// built to always satisfy their own preconditions, so any failure there
    /// is treated as corruption.
    pub(crate) fn into_fatal(self, context: &str) -> TreasuryError {
        if self.is_fatal() {
            self
        } else {
            TreasuryError::Invariant(format!("{context}: {self}"))
        }
    }
}

pub type Result<T> = std::result::Result<T, TreasuryError>;
