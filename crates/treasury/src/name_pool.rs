//! Name-holder reward pool
//!
//! Every holder of a registered name earns an equal share (unit stake) of
//! the name-pool funds. Enrollment is deferred: gaining eligibility only
//! schedules the holder, and the per-block driver enrolls scheduled holders
//! once their grace period has elapsed.

use crate::errors::{Result, TreasuryError};
use crate::escrow::{PayoutBook, PayoutOutcome, PayoutPlan};
use crate::schedule::TimeQueue;
use crate::share_index::{Distribution, SharePool};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tally_types::{Address, Dec, Timestamp};
use tracing::{debug, info};

/// Stake every enrolled name holder carries.
pub const NAME_HOLDER_STAKE: u128 = 1;

/// Source of truth for name ownership, owned by the name registry module.
pub trait NameRegistry: Send + Sync {
    fn holds_name(&self, address: &Address) -> bool;
}

/// Shared in-memory registry, for tests and single-process hosts.
#[derive(Debug, Clone, Default)]
pub struct StaticNameRegistry {
    holders: Arc<RwLock<BTreeSet<Address>>>,
}

impl StaticNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, address: Address) {
        self.holders.write().insert(address);
    }

    pub fn revoke(&self, address: &Address) {
        self.holders.write().remove(address);
    }
}

impl NameRegistry for StaticNameRegistry {
    fn holds_name(&self, address: &Address) -> bool {
        self.holders.read().contains(address)
    }
}

/// A name-pool exit computed against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameExitPlan {
    pub reward: Dec,
    pub payout: PayoutPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePool {
    shares: SharePool,
    queue: TimeQueue<Address>,
    /// Reverse index of `queue`: at most one pending entry per address.
    scheduled: BTreeMap<Address, Timestamp>,
    book: PayoutBook,
}

impl NamePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shares(&self) -> &SharePool {
        &self.shares
    }

    pub fn queue(&self) -> &TimeQueue<Address> {
        &self.queue
    }

    pub fn book(&self) -> &PayoutBook {
        &self.book
    }

    pub fn scheduled_at(&self, address: &Address) -> Option<Timestamp> {
        self.scheduled.get(address).copied()
    }

    pub fn distribute(&mut self, amount: u128) -> Result<Distribution> {
        self.shares.distribute(amount)
    }

    pub fn release_pending(&mut self) -> Result<Distribution> {
        self.shares.release_pending()
    }

    /// Queue `address` for enrollment at `due`. Returns `false` when the
    /// address is already enrolled or already waiting.
    pub fn schedule(&mut self, address: Address, due: Timestamp) -> bool {
        if self.shares.is_enrolled(&address) || self.scheduled.contains_key(&address) {
            debug!(
                target: "treasury",
                "Name holder {} already enrolled or scheduled, ignoring", address
            );
            return false;
        }
        self.queue.insert(address, due);
        self.scheduled.insert(address, due);
        debug!(target: "treasury", "Scheduled name holder {} for enrollment at {}", address, due);
        true
    }

    /// Drop a pending enrollment. Returns the due time it had.
    pub fn cancel_scheduled(&mut self, address: &Address) -> Option<Timestamp> {
        let due = self.scheduled.remove(address)?;
        self.queue.remove(address, due);
        debug!(target: "treasury", "Cancelled scheduled enrollment of {}", address);
        Some(due)
    }

    /// Enroll every holder whose grace period ended by `now`, in queue
    /// order. Each entry is removed before its enrollment.
    pub fn activate_due(&mut self, now: Timestamp) -> Result<Vec<Address>> {
        let due: Vec<(Timestamp, Address)> = self
            .queue
            .due_by(now)
            .map(|(at, address)| (at, *address))
            .collect();

        let mut activated = Vec::with_capacity(due.len());
        for (at, address) in due {
            self.queue.remove(&address, at);
            self.scheduled.remove(&address);
            self.shares.enroll(address, NAME_HOLDER_STAKE)?;
            activated.push(address);
        }

        if !activated.is_empty() {
            info!(
                target: "treasury",
                "Activated {} name holder enrollment(s) at {}",
                activated.len(),
                now
            );
        }
        Ok(activated)
    }

    /// What withdrawing `address` now would pay out.
    pub fn plan_exit(&self, address: &Address, frozen: bool) -> Result<NameExitPlan> {
        let reward = self.shares.pending_reward(address)?;
        let payout = self.book.plan(address, reward, frozen)?;
        Ok(NameExitPlan { reward, payout })
    }

    /// Commit an exit. With `reenroll` the holder keeps accruing from the
    /// current rate.
    pub fn commit_exit(&mut self, plan: &NameExitPlan, reenroll: bool) -> Result<PayoutOutcome> {
        let address = *plan.payout.address();
        let released = if reenroll {
            self.shares.rebaseline(&address)?
        } else {
            self.shares.unenroll(&address)?
        };
        if released.reward != plan.reward {
            return Err(TreasuryError::Invariant(format!(
                "name reward of {} changed between plan ({}) and commit ({})",
                address, plan.reward, released.reward
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
        self.book.validate()?;
        if self.queue.len() != self.scheduled.len() {
            return Err(TreasuryError::Corrupted(format!(
                "{} queued enrollments but {} indexed",
                self.queue.len(),
                self.scheduled.len()
            )));
        }
        for (due, address) in self.queue.iter() {
            if self.scheduled.get(address) != Some(&due) {
                return Err(TreasuryError::Corrupted(format!(
                    "queued enrollment of {address} at {due} missing from index"
                )));
            }
            if self.shares.is_enrolled(address) {
                return Err(TreasuryError::Corrupted(format!(
                    "{address} is both enrolled and scheduled"
                )));
            }
        }
        Ok(())
    }

    /// Reassemble from persisted parts; the per-address index is derived
    /// from the queue.
    pub(crate) fn from_parts(
        shares: SharePool,
        queue: TimeQueue<Address>,
        book: PayoutBook,
    ) -> Result<Self> {
        let scheduled = queue.iter().map(|(due, address)| (*address, due)).collect();
        let pool = Self {
            shares,
            queue,
            scheduled,
            book,
        };
        pool.validate()?;
        Ok(pool)
    }
}
