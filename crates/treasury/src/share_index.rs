//! Share-index reward engine
//!
//! A pool keeps one monotonically increasing `global_rate`: the reward owed
//! per unit of stake since genesis. Each participant records the rate at the
//! moment they enrolled; what they are owed is
//! `stake * (global_rate - enrolled_rate)`. A distribution therefore touches
//! only the pool, never the participants, no matter how many there are.
//!
//! Division by the total stake truncates at the atom level. The truncated
//! residue is kept as `rate_dust` and folded into the next distribution, so
//! no value is lost to division.

use crate::errors::{Result, TreasuryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tally_types::{checked_sum, Address, AmountError, Dec, TokenAmount};
use tracing::{debug, warn};

/// Per-participant enrollment record. Exists only while enrolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantAccount {
    /// Snapshot of the pool's global rate at enrollment.
    pub enrolled_rate: Dec,
    pub stake: u128,
}

/// What a distribution did with the incoming funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distribution {
    /// Zero amount, nothing happened.
    Skipped,
    /// No stake enrolled; funds parked in `pending_undistributed`.
    Parked { amount: TokenAmount },
    /// Rate advanced by `rate_increment`.
    Applied {
        amount: TokenAmount,
        rate_increment: Dec,
        dust: Dec,
    },
}

/// Stake and reward released by [`SharePool::unenroll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unenrolled {
    pub stake: u128,
    pub reward: Dec,
}

/// Rate-indexed reward pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePool {
    global_rate: Dec,
    total_stake: u128,
    /// Funds that arrived while nobody was enrolled.
    pending_undistributed: TokenAmount,
    /// Sub-atom residue of the last division, carried into the next one.
    rate_dust: Dec,
    accounts: BTreeMap<Address, ParticipantAccount>,
}

impl SharePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_rate(&self) -> Dec {
        self.global_rate
    }

    pub fn total_stake(&self) -> u128 {
        self.total_stake
    }

    pub fn pending_undistributed(&self) -> TokenAmount {
        self.pending_undistributed
    }

    pub fn rate_dust(&self) -> Dec {
        self.rate_dust
    }

    pub fn account(&self, address: &Address) -> Option<&ParticipantAccount> {
        self.accounts.get(address)
    }

    pub fn is_enrolled(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &ParticipantAccount)> {
        self.accounts.iter()
    }

    pub fn participant_count(&self) -> usize {
        self.accounts.len()
    }

    /// Spread `amount` over the currently enrolled stake.
    pub fn distribute(&mut self, amount: TokenAmount) -> Result<Distribution> {
        if amount == 0 {
            return Ok(Distribution::Skipped);
        }

        if self.total_stake == 0 {
            self.pending_undistributed = self
                .pending_undistributed
                .checked_add(amount)
                .ok_or(TreasuryError::Arithmetic(AmountError::Overflow))?;
            warn!(
                target: "treasury",
                "No stake enrolled, parked {} as undistributed (total parked {})",
                amount, self.pending_undistributed
            );
            return Ok(Distribution::Parked { amount });
        }

        let funds = Dec::try_from_int(amount)?.checked_add(self.rate_dust)?;
        let increment = funds.checked_div_int(self.total_stake)?;
        let spread = increment.checked_mul_int(self.total_stake)?;
        let dust = funds.checked_sub(spread)?;

        self.global_rate = self.global_rate.checked_add(increment)?;
        self.rate_dust = dust;

        debug!(
            target: "treasury",
            "Distributed {} over stake {}: rate +{} -> {}",
            amount, self.total_stake, increment, self.global_rate
        );

        Ok(Distribution::Applied {
            amount,
            rate_increment: increment,
            dust,
        })
    }

    /// Move parked funds into the rate once stake exists. Parked funds are
    /// never applied implicitly; this is the explicit release.
    pub fn release_pending(&mut self) -> Result<Distribution> {
        if self.pending_undistributed == 0 {
            return Err(TreasuryError::InvalidAmount("nothing pending to release"));
        }
        if self.total_stake == 0 {
            return Ok(Distribution::Skipped);
        }
        let amount = self.pending_undistributed;
        self.pending_undistributed = 0;
        self.distribute(amount)
    }

    /// Start accruing for `address` at the current rate.
    pub fn enroll(&mut self, address: Address, stake: u128) -> Result<()> {
        if self.accounts.contains_key(&address) {
            return Err(TreasuryError::AlreadyEnrolled { address });
        }
        self.total_stake = self
            .total_stake
            .checked_add(stake)
            .ok_or(TreasuryError::Arithmetic(AmountError::Overflow))?;
        self.accounts.insert(
            address,
            ParticipantAccount {
                enrolled_rate: self.global_rate,
                stake,
            },
        );
        Ok(())
    }

    /// Stop accruing for `address` and return what it earned.
    pub fn unenroll(&mut self, address: &Address) -> Result<Unenrolled> {
        let reward = self.pending_reward(address)?;
        let account = self
            .accounts
            .remove(address)
            .ok_or(TreasuryError::NotEnrolled { address: *address })?;
        self.total_stake = self.total_stake.checked_sub(account.stake).ok_or_else(|| {
            TreasuryError::Invariant(format!(
                "total stake {} below stake {} of {}",
                self.total_stake, account.stake, address
            ))
        })?;
        Ok(Unenrolled {
            stake: account.stake,
            reward,
        })
    }

    /// Unenroll and immediately enroll again with the same stake: the
    /// accrual clock restarts at the current rate.
    pub fn rebaseline(&mut self, address: &Address) -> Result<Unenrolled> {
        let released = self.unenroll(address)?;
        self.enroll(*address, released.stake)?;
        Ok(released)
    }

    /// Reward accrued by `address` so far. Read-only.
    pub fn pending_reward(&self, address: &Address) -> Result<Dec> {
        let account = self
            .accounts
            .get(address)
            .ok_or(TreasuryError::NotEnrolled { address: *address })?;
        let delta = self
            .global_rate
            .checked_sub(account.enrolled_rate)
            .map_err(|_| {
                TreasuryError::Invariant(format!(
                    "enrolled rate of {} above global rate {}",
                    address, self.global_rate
                ))
            })?;
        Ok(delta.checked_mul_int(account.stake)?)
    }

    /// Sum of all enrolled participants' pending rewards.
    pub fn total_pending_rewards(&self) -> Result<Dec> {
        let rewards = self
            .accounts
            .keys()
            .map(|address| self.pending_reward(address))
            .collect::<Result<Vec<_>>>()?;
        Ok(checked_sum(rewards)?)
    }

    /// Structural consistency: the stake total matches the accounts and no
    /// snapshot sits above the global rate.
    pub fn validate(&self) -> Result<()> {
        let stake_sum = self
            .accounts
            .values()
            .try_fold(0u128, |acc, a| acc.checked_add(a.stake))
            .ok_or_else(|| TreasuryError::Corrupted("stake sum overflows".into()))?;
        if stake_sum != self.total_stake {
            return Err(TreasuryError::Corrupted(format!(
                "total stake {} does not match account stakes {}",
                self.total_stake, stake_sum
            )));
        }
        if let Some((address, _)) = self
            .accounts
            .iter()
            .find(|(_, a)| a.enrolled_rate > self.global_rate)
        {
            return Err(TreasuryError::Corrupted(format!(
                "{address} enrolled above the global rate"
            )));
        }
        Ok(())
    }

    /// Rebuild a pool from persisted parts, checking consistency.
    pub(crate) fn from_parts(
        global_rate: Dec,
        total_stake: u128,
        pending_undistributed: TokenAmount,
        rate_dust: Dec,
        accounts: BTreeMap<Address, ParticipantAccount>,
    ) -> Result<Self> {
        let pool = Self {
            global_rate,
            total_stake,
            pending_undistributed,
            rate_dust,
            accounts,
        };
        pool.validate()?;
        Ok(pool)
    }
}

/// Persisted pool header: everything but the participant accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHeader {
    pub global_rate: Dec,
    pub total_stake: u128,
    pub pending_undistributed: TokenAmount,
    pub rate_dust: Dec,
}

impl From<&SharePool> for PoolHeader {
    fn from(pool: &SharePool) -> Self {
        Self {
            global_rate: pool.global_rate,
            total_stake: pool.total_stake,
            pending_undistributed: pool.pending_undistributed,
            rate_dust: pool.rate_dust,
        }
    }
}
