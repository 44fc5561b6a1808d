//! Request and receipt types exchanged with the host chain.
//!
//! Receipts carry the realized amounts of a successful operation so the
//! host can emit events; the treasury itself emits nothing.

use crate::escrow::PayoutOutcome;
use crate::share_index::Distribution;
use crate::validator_pool::{Allocation, VotingPower};
use serde::{Deserialize, Serialize};
use tally_types::{Address, Dec, Timestamp, TokenAmount};

/// Input of the per-block driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginBlock {
    pub block_time: Timestamp,
    pub name_pool_funds: TokenAmount,
    #[serde(default)]
    pub savings_pool_funds: TokenAmount,
    pub validator_fees: TokenAmount,
    /// Voting power table of the previous block.
    pub voting_powers: Vec<VotingPower>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub block_time: Timestamp,
    pub name_distribution: Distribution,
    pub savings_distribution: Distribution,
    /// Name holders whose enrollment activated this block, in queue order.
    pub activated: Vec<Address>,
    pub validator_allocation: Allocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRewardWithdrawn {
    pub address: Address,
    pub reward: Dec,
    pub outcome: PayoutOutcome,
    /// Still holds a name and keeps accruing.
    pub reenrolled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsDeposited {
    pub address: Address,
    pub amount: TokenAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsWithdrawn {
    pub address: Address,
    pub principal: TokenAmount,
    pub interest: Dec,
    pub outcome: PayoutOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsInterestWithdrawn {
    pub address: Address,
    pub interest: Dec,
    pub outcome: PayoutOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRewardWithdrawn {
    pub operator: Address,
    pub paid: TokenAmount,
    /// Fraction left accumulated for the next withdrawal.
    pub remaining: Dec,
}

/// Which share-index pool a query or release targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Name,
    Savings,
}

/// Snapshot of a pool header for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub kind: PoolKind,
    pub global_rate: Dec,
    pub total_stake: u128,
    pub pending_undistributed: TokenAmount,
    pub rate_dust: Dec,
    pub participants: usize,
}
