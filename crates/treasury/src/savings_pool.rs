//! Savings deposits earning interest
//!
//! A depositor's principal is their stake. Principal sits in the custody
//! account; interest accrues through the share index and is paid from the
//! savings rewards account.

use crate::errors::{Result, TreasuryError};
use crate::escrow::{PayoutBook, PayoutOutcome, PayoutPlan};
use crate::share_index::{Distribution, SharePool};
use serde::{Deserialize, Serialize};
use tally_types::{Address, Dec, TokenAmount};

/// A savings withdrawal computed against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavingsExitPlan {
    pub principal: TokenAmount,
    pub interest: Dec,
    pub payout: PayoutPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsPool {
    shares: SharePool,
    book: PayoutBook,
}

impl SavingsPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shares(&self) -> &SharePool {
        &self.shares
    }

    pub fn book(&self) -> &PayoutBook {
        &self.book
    }

    pub fn distribute(&mut self, amount: TokenAmount) -> Result<Distribution> {
        self.shares.distribute(amount)
    }

    pub fn release_pending(&mut self) -> Result<Distribution> {
        self.shares.release_pending()
    }

    /// Preconditions of a deposit, checked before any funds move.
    pub fn check_deposit(&self, address: &Address, amount: TokenAmount) -> Result<()> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount("deposit must be positive"));
        }
        if self.shares.is_enrolled(address) {
            return Err(TreasuryError::AlreadyEnrolled { address: *address });
        }
        if self.shares.total_stake().checked_add(amount).is_none() {
            return Err(TreasuryError::InvalidAmount("deposit overflows total stake"));
        }
        Ok(())
    }

    pub fn commit_deposit(&mut self, address: Address, amount: TokenAmount) -> Result<()> {
        self.shares.enroll(address, amount)
    }

    /// Full exit: principal back, interest through the payout book.
    pub fn plan_exit(&self, address: &Address, frozen: bool) -> Result<SavingsExitPlan> {
        let account = self
            .shares
            .account(address)
            .ok_or(TreasuryError::NotEnrolled { address: *address })?;
        let interest = self.shares.pending_reward(address)?;
        Ok(SavingsExitPlan {
            principal: account.stake,
            interest,
            payout: self.book.plan(address, interest, frozen)?,
        })
    }

    /// Commit an exit. With `keep_principal` the deposit stays enrolled and
    /// starts accruing again from the current rate.
    pub fn commit_exit(
        &mut self,
        plan: &SavingsExitPlan,
        keep_principal: bool,
    ) -> Result<PayoutOutcome> {
        let address = *plan.payout.address();
        let released = if keep_principal {
            self.shares.rebaseline(&address)?
        } else {
            self.shares.unenroll(&address)?
        };
        if released.reward != plan.interest || released.stake != plan.principal {
            return Err(TreasuryError::Invariant(format!(
                "savings account of {address} changed between plan and commit"
            )));
        }
        Ok(self.book.apply(&plan.payout))
    }

    /// Commit a payout of escrow held for an address that is no longer
    /// enrolled.
    pub fn commit_release(&mut self, plan: &PayoutPlan) -> PayoutOutcome {
        self.book.apply(plan)
    }

    pub fn validate(&self) -> Result<()> {
        self.shares.validate()?;
        self.book.validate()
    }

    pub(crate) fn from_parts(shares: SharePool, book: PayoutBook) -> Result<Self> {
        let pool = Self { shares, book };
        pool.validate()?;
        Ok(pool)
    }
}
