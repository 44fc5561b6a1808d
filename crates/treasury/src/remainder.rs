//! Fractional remainder ledger
//!
//! Payouts transfer whole units only. The sub-unit part of every payout is
//! parked here per address and carried forward; once the parked fractions
//! add up to a whole unit it is paid out with the next payout. Over any
//! history, `paid whole units + stored fraction == sum of fractions`.

use crate::errors::{Result, TreasuryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tally_types::{Address, Dec, TokenAmount};

/// Per-address leftover fractions, each in `[0, 1)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeftoverLedger {
    leftovers: BTreeMap<Address, Dec>,
}

impl LeftoverLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &Address) -> Dec {
        self.leftovers.get(address).copied().unwrap_or(Dec::ZERO)
    }

    /// What [`Self::credit_remainder`] would do, without doing it:
    /// `(whole units to pay now, fraction left stored)`.
    pub fn preview(&self, address: &Address, fraction: Dec) -> Result<(TokenAmount, Dec)> {
        let sum = self.get(address).checked_add(fraction)?;
        Ok(sum.split())
    }

    /// Add `fraction` to the stored leftover of `address`; returns the whole
    /// units that became payable.
    pub fn credit_remainder(&mut self, address: &Address, fraction: Dec) -> Result<TokenAmount> {
        let (whole, residual) = self.preview(address, fraction)?;
        self.set(address, residual);
        Ok(whole)
    }

    /// Store `residual` directly. Used when committing a previewed payout.
    pub(crate) fn set(&mut self, address: &Address, residual: Dec) {
        debug_assert!(residual < Dec::ONE);
        if residual.is_zero() {
            self.leftovers.remove(address);
        } else {
            self.leftovers.insert(*address, residual);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Dec)> {
        self.leftovers.iter()
    }

    pub fn total(&self) -> Result<Dec> {
        Ok(tally_types::checked_sum(self.leftovers.values().copied())?)
    }

    pub fn validate(&self) -> Result<()> {
        match self.leftovers.iter().find(|(_, v)| **v >= Dec::ONE || v.is_zero()) {
            Some((address, value)) => Err(TreasuryError::Corrupted(format!(
                "leftover {value} of {address} outside (0, 1)"
            ))),
            None => Ok(()),
        }
    }
}

impl FromIterator<(Address, Dec)> for LeftoverLedger {
    fn from_iter<T: IntoIterator<Item = (Address, Dec)>>(iter: T) -> Self {
        Self {
            leftovers: iter.into_iter().collect(),
        }
    }
}
