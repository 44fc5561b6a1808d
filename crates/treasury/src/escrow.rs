//! Escrow and freeze accounting
//!
//! Before the global freeze deadline no reward leaves custody: payouts are
//! credited to an escrow balance instead. The first payout to the same
//! address after the deadline drains the escrow together with the new
//! amount, then routes the fractional part through the remainder ledger so
//! only whole units are transferred.
//!
//! A payout is split into [`PayoutBook::plan`] (read-only) and
//! [`PayoutBook::apply`] so the caller can run the transfer in between and
//! commit nothing when it fails.

use crate::account_ledger::Transfer;
use crate::errors::{Result, TreasuryError};
use crate::remainder::LeftoverLedger;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tally_types::{Address, AmountError, Dec, TokenAmount};

/// Realized effect of one payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutOutcome {
    /// Withdrawals frozen; `amount` added to escrow, now `escrow_total`.
    Withheld { amount: Dec, escrow_total: Dec },
    /// `paid` whole units transferred; `released_escrow` was merged in and
    /// `leftover` is the fraction still carried for the address.
    Transferred {
        paid: TokenAmount,
        released_escrow: Dec,
        leftover: Dec,
    },
}

/// A computed but not yet committed payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutPlan {
    address: Address,
    kind: PlanKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PlanKind {
    Withhold {
        amount: Dec,
        escrow_total: Dec,
    },
    Transfer {
        paid: TokenAmount,
        released_escrow: Dec,
        leftover: Dec,
    },
}

impl PayoutPlan {
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The ledger transfer this payout needs, if any.
    pub fn transfer_from(&self, custody: &Address) -> Option<Transfer> {
        match self.kind {
            PlanKind::Transfer { paid, .. } if paid > 0 => {
                Some(Transfer::new(*custody, self.address, paid))
            }
            _ => None,
        }
    }

    pub fn outcome(&self) -> PayoutOutcome {
        match self.kind {
            PlanKind::Withhold {
                amount,
                escrow_total,
            } => PayoutOutcome::Withheld {
                amount,
                escrow_total,
            },
            PlanKind::Transfer {
                paid,
                released_escrow,
                leftover,
            } => PayoutOutcome::Transferred {
                paid,
                released_escrow,
                leftover,
            },
        }
    }
}

/// Escrow balances and leftover fractions owed by one custody account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutBook {
    escrow: BTreeMap<Address, Dec>,
    leftovers: LeftoverLedger,
}

impl PayoutBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn escrow_of(&self, address: &Address) -> Dec {
        self.escrow.get(address).copied().unwrap_or(Dec::ZERO)
    }

    pub fn leftover_of(&self, address: &Address) -> Dec {
        self.leftovers.get(address)
    }

    pub fn escrow_entries(&self) -> impl Iterator<Item = (&Address, &Dec)> {
        self.escrow.iter()
    }

    pub fn leftovers(&self) -> &LeftoverLedger {
        &self.leftovers
    }

    /// Work out what paying `amount` to `address` means right now.
    pub fn plan(&self, address: &Address, amount: Dec, frozen: bool) -> Result<PayoutPlan> {
        let kind = if frozen {
            PlanKind::Withhold {
                amount,
                escrow_total: self.escrow_of(address).checked_add(amount)?,
            }
        } else {
            let released_escrow = self.escrow_of(address);
            let total = amount.checked_add(released_escrow)?;
            let (whole, fraction) = total.split();
            let (carried, leftover) = self.leftovers.preview(address, fraction)?;
            PlanKind::Transfer {
                paid: whole
                    .checked_add(carried)
                    .ok_or(TreasuryError::Arithmetic(AmountError::Overflow))?,
                released_escrow,
                leftover,
            }
        };
        Ok(PayoutPlan {
            address: *address,
            kind,
        })
    }

    /// Payout of nothing but what is already held for `address`: escrow
    /// plus leftover. `None` when no escrow is held, since a leftover alone
    /// never reaches a whole unit.
    pub fn plan_release(&self, address: &Address) -> Result<Option<PayoutPlan>> {
        if self.escrow_of(address).is_zero() {
            return Ok(None);
        }
        self.plan(address, Dec::ZERO, false).map(Some)
    }

    /// Commit a plan produced by [`Self::plan`] on this same book.
    pub fn apply(&mut self, plan: &PayoutPlan) -> PayoutOutcome {
        match plan.kind {
            PlanKind::Withhold { escrow_total, .. } => {
                if !escrow_total.is_zero() {
                    self.escrow.insert(plan.address, escrow_total);
                }
            }
            PlanKind::Transfer { leftover, .. } => {
                self.escrow.remove(&plan.address);
                self.leftovers.set(&plan.address, leftover);
            }
        }
        plan.outcome()
    }

    pub fn total_escrow(&self) -> Result<Dec> {
        Ok(tally_types::checked_sum(self.escrow.values().copied())?)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((address, _)) = self.escrow.iter().find(|(_, v)| v.is_zero()) {
            return Err(TreasuryError::Corrupted(format!(
                "empty escrow entry for {address}"
            )));
        }
        self.leftovers.validate()
    }

    pub(crate) fn from_parts(
        escrow: BTreeMap<Address, Dec>,
        leftovers: LeftoverLedger,
    ) -> Result<Self> {
        let book = Self { escrow, leftovers };
        book.validate()?;
        Ok(book)
    }
}
