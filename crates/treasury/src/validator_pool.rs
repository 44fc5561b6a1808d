//! Validator fee rewards
//!
//! Validators are not rate-indexed: each block's fees are split by voting
//! power and added to a running total per operator. Each share truncates
//! toward zero; what truncation drops across all validators of a block goes
//! into one global carry, and the carry's whole units go back to the fee
//! collector.

use crate::errors::{Result, TreasuryError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tally_types::{checked_sum, Address, ConsensusId, Dec, TokenAmount};
use tracing::{debug, info, warn};

/// One row of the previous block's voting power table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingPower {
    pub consensus_id: ConsensusId,
    pub power: u64,
}

impl VotingPower {
    pub fn new(consensus_id: ConsensusId, power: u64) -> Self {
        Self {
            consensus_id,
            power,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub consensus_id: ConsensusId,
    /// Account that owns the validator's rewards.
    pub operator: Address,
}

/// Lookup into the staking module's validator set.
pub trait StakingRegistry: Send + Sync {
    fn validator_by_consensus_id(&self, id: &ConsensusId) -> Option<Validator>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticStakingRegistry {
    validators: Arc<RwLock<BTreeMap<ConsensusId, Validator>>>,
}

impl StaticStakingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, validator: Validator) {
        self.validators
            .write()
            .insert(validator.consensus_id, validator);
    }

    pub fn remove(&self, id: &ConsensusId) {
        self.validators.write().remove(id);
    }
}

impl StakingRegistry for StaticStakingRegistry {
    fn validator_by_consensus_id(&self, id: &ConsensusId) -> Option<Validator> {
        self.validators.read().get(id).copied()
    }
}

/// Result of splitting one block's fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Allocation {
    /// No fees, or nobody had voting power. Fees stay with the collector.
    Skipped { fee: TokenAmount },
    Allocated {
        fee: TokenAmount,
        /// Per operator share, in voting power table order.
        shares: Vec<(Address, Dec)>,
        /// Whole units of the carry sent back to the fee collector.
        carry_returned: TokenAmount,
        /// Carry left after the return, always below one unit.
        carry_remainder: Dec,
    },
}

impl Allocation {
    pub fn fee(&self) -> TokenAmount {
        match self {
            Allocation::Skipped { fee } | Allocation::Allocated { fee, .. } => *fee,
        }
    }

    /// Fee units that leave the fee collector for good.
    pub fn retained(&self) -> TokenAmount {
        match self {
            Allocation::Skipped { .. } => 0,
            Allocation::Allocated {
                fee,
                carry_returned,
                ..
            } => fee.saturating_sub(*carry_returned),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRewards {
    accumulated: BTreeMap<Address, Dec>,
    carry_remainder: Dec,
}

impl ValidatorRewards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulated_of(&self, operator: &Address) -> Dec {
        self.accumulated.get(operator).copied().unwrap_or(Dec::ZERO)
    }

    pub fn accumulated(&self) -> impl Iterator<Item = (&Address, &Dec)> {
        self.accumulated.iter()
    }

    pub fn carry_remainder(&self) -> Dec {
        self.carry_remainder
    }

    /// Split `fee` by voting power. Read-only; an unknown or repeated
    /// consensus id means the power table is corrupt.
    pub fn plan_allocation(
        &self,
        fee: TokenAmount,
        powers: &[VotingPower],
        staking: &dyn StakingRegistry,
    ) -> Result<Allocation> {
        let total_power = powers
            .iter()
            .try_fold(0u128, |acc, p| acc.checked_add(u128::from(p.power)))
            .ok_or_else(|| TreasuryError::Invariant("total voting power overflows".into()))?;

        if fee == 0 {
            debug!(target: "treasury", "No validator fees collected");
            return Ok(Allocation::Skipped { fee });
        }
        if total_power == 0 {
            warn!(
                target: "treasury",
                "Total voting power is zero, leaving {} in the fee collector", fee
            );
            return Ok(Allocation::Skipped { fee });
        }

        let fee_dec = Dec::try_from_int(fee)?;
        let mut seen = BTreeSet::new();
        let mut shares = Vec::with_capacity(powers.len());
        for entry in powers {
            if !seen.insert(entry.consensus_id) {
                return Err(TreasuryError::Invariant(format!(
                    "consensus id {:?} appears twice in the voting power table",
                    entry.consensus_id
                )));
            }
            let validator = staking
                .validator_by_consensus_id(&entry.consensus_id)
                .ok_or_else(|| {
                    TreasuryError::Invariant(format!(
                        "no validator for consensus id {:?}",
                        entry.consensus_id
                    ))
                })?;
            let share = fee_dec.checked_mul_ratio(u128::from(entry.power), total_power)?;
            shares.push((validator.operator, share));
        }

        let allocated = checked_sum(shares.iter().map(|(_, share)| *share))?;
        let carry = self
            .carry_remainder
            .checked_add(fee_dec.checked_sub(allocated)?)?;
        let (carry_returned, carry_remainder) = carry.split();

        Ok(Allocation::Allocated {
            fee,
            shares,
            carry_returned,
            carry_remainder,
        })
    }

    pub fn commit_allocation(&mut self, allocation: &Allocation) -> Result<()> {
        let Allocation::Allocated {
            fee,
            shares,
            carry_returned,
            carry_remainder,
        } = allocation
        else {
            return Ok(());
        };

        for (operator, share) in shares {
            if share.is_zero() {
                continue;
            }
            let total = self.accumulated_of(operator).checked_add(*share)?;
            self.accumulated.insert(*operator, total);
        }
        self.carry_remainder = *carry_remainder;

        info!(
            target: "treasury",
            "Allocated {} in fees across {} validator(s), returned {} to the fee collector",
            fee,
            shares.len(),
            carry_returned
        );
        Ok(())
    }

    /// Whole units payable to `operator` and the fraction left behind.
    pub fn plan_withdraw(&self, operator: &Address) -> Result<(TokenAmount, Dec)> {
        let (whole, fraction) = self.accumulated_of(operator).split();
        if whole == 0 {
            return Err(TreasuryError::NoAccumulatedReward { address: *operator });
        }
        Ok((whole, fraction))
    }

    pub fn commit_withdraw(&mut self, operator: &Address, remaining: Dec) {
        if remaining.is_zero() {
            self.accumulated.remove(operator);
        } else {
            self.accumulated.insert(*operator, remaining);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.carry_remainder >= Dec::ONE {
            return Err(TreasuryError::Corrupted(format!(
                "validator carry {} holds a whole unit",
                self.carry_remainder
            )));
        }
        if let Some((operator, _)) = self.accumulated.iter().find(|(_, v)| v.is_zero()) {
            return Err(TreasuryError::Corrupted(format!(
                "empty accumulated reward entry for {operator}"
            )));
        }
        Ok(())
    }

    pub(crate) fn from_parts(
        accumulated: BTreeMap<Address, Dec>,
        carry_remainder: Dec,
    ) -> Result<Self> {
        let rewards = Self {
            accumulated,
            carry_remainder,
        };
        rewards.validate()?;
        Ok(rewards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address([n; 32])
    }

    fn cid(n: u8) -> ConsensusId {
        ConsensusId([n; 32])
    }

    fn registry(ids: &[u8]) -> StaticStakingRegistry {
        let registry = StaticStakingRegistry::new();
        for n in ids {
            registry.register(Validator {
                consensus_id: cid(*n),
                operator: addr(*n),
            });
        }
        registry
    }

    fn d(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn test_zero_power_skips() {
        let rewards = ValidatorRewards::new();
        let plan = rewards
            .plan_allocation(100, &[VotingPower::new(cid(1), 0)], &registry(&[1]))
            .unwrap();
        assert_eq!(plan, Allocation::Skipped { fee: 100 });
        assert_eq!(plan.fee(), 100);
        assert_eq!(plan.retained(), 0);
    }

    #[test]
    fn test_allocation_truncates_and_carries() {
        let staking = registry(&[1, 2, 3]);
        let powers = [
            VotingPower::new(cid(1), 1),
            VotingPower::new(cid(2), 1),
            VotingPower::new(cid(3), 1),
        ];
        let mut rewards = ValidatorRewards::new();
        let plan = rewards.plan_allocation(10, &powers, &staking).unwrap();
        rewards.commit_allocation(&plan).unwrap();

        let third = d("3.333333333333333333");
        assert_eq!(rewards.accumulated_of(&addr(1)), third);
        assert_eq!(rewards.carry_remainder(), Dec::from_atoms(1));
        assert_eq!(plan.fee(), 10);
        assert_eq!(plan.retained(), 10);
    }

    #[test]
    fn test_carry_whole_units_are_returned() {
        let mut rewards = ValidatorRewards::from_parts(BTreeMap::new(), d("0.9")).unwrap();
        let staking = registry(&[1, 2, 3]);
        let powers = [
            VotingPower::new(cid(1), 1),
            VotingPower::new(cid(2), 1),
            VotingPower::new(cid(3), 1),
        ];
        let plan = rewards.plan_allocation(1, &powers, &staking).unwrap();
        match &plan {
            Allocation::Allocated {
                carry_returned,
                carry_remainder,
                ..
            } => {
                assert_eq!(*carry_returned, 0);
                assert_eq!(*carry_remainder, d("0.900000000000000001"));
            }
            other => panic!("unexpected {other:?}"),
        }
        rewards.commit_allocation(&plan).unwrap();

        let mut carry = ValidatorRewards::from_parts(BTreeMap::new(), d("0.999999999999999999")).unwrap();
        let plan = carry.plan_allocation(10, &powers, &staking).unwrap();
        assert!(matches!(
            plan,
            Allocation::Allocated { carry_returned: 1, carry_remainder, .. } if carry_remainder == Dec::ZERO
        ));
        assert_eq!(plan.retained(), 9);
        carry.commit_allocation(&plan).unwrap();
        carry.validate().unwrap();
    }

    #[test]
    fn test_unknown_or_duplicate_validator_is_rejected() {
        let rewards = ValidatorRewards::new();
        let staking = registry(&[1]);
        assert!(matches!(
            rewards.plan_allocation(5, &[VotingPower::new(cid(2), 1)], &staking),
            Err(TreasuryError::Invariant(_))
        ));
        assert!(matches!(
            rewards.plan_allocation(
                5,
                &[VotingPower::new(cid(1), 1), VotingPower::new(cid(1), 2)],
                &staking
            ),
            Err(TreasuryError::Invariant(_))
        ));

        // a validator dropped from the staking set is no longer resolvable
        rewards
            .plan_allocation(5, &[VotingPower::new(cid(1), 1)], &staking)
            .unwrap();
        staking.remove(&cid(1));
        assert!(matches!(
            rewards.plan_allocation(5, &[VotingPower::new(cid(1), 1)], &staking),
            Err(TreasuryError::Invariant(_))
        ));
    }

    #[test]
    fn test_withdraw_keeps_fraction() {
        let mut accumulated = BTreeMap::new();
        accumulated.insert(addr(1), d("4.75"));
        accumulated.insert(addr(2), d("0.5"));
        let mut rewards = ValidatorRewards::from_parts(accumulated, Dec::ZERO).unwrap();

        let (whole, rest) = rewards.plan_withdraw(&addr(1)).unwrap();
        assert_eq!((whole, rest), (4, d("0.75")));
        rewards.commit_withdraw(&addr(1), rest);
        assert_eq!(rewards.accumulated_of(&addr(1)), d("0.75"));

        assert!(matches!(
            rewards.plan_withdraw(&addr(2)),
            Err(TreasuryError::NoAccumulatedReward { .. })
        ));
    }
}
