//! Token ledger interface for treasury payouts
//!
//! The treasury never owns balances. It moves whole token units between
//! custody accounts through a [`TokenLedger`] supplied by the host chain.
//!
//! [`TransferJournal`] gives a multi-transfer operation all-or-nothing
//! semantics: if a later transfer fails, the earlier ones are reversed before
//! the error is returned.

use crate::errors::{Result as TreasuryResult, TreasuryError};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tally_types::{Address, TokenAmount};
use tracing::{debug, error};

/// Interface for token ledger operations.
pub trait TokenLedger: Send + Sync {
    /// Move `amount` whole units from `from` to `to`.
    fn transfer(&mut self, from: &Address, to: &Address, amount: TokenAmount) -> Result<()>;

    /// Current balance of `address`.
    fn balance(&self, address: &Address) -> Result<TokenAmount>;
}

/// A single executed or planned transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    pub amount: TokenAmount,
}

impl Transfer {
    pub fn new(from: Address, to: Address, amount: TokenAmount) -> Self {
        Self { from, to, amount }
    }
}

/// Executes transfers against a ledger and remembers them so they can be
/// reversed if the surrounding operation fails.
pub struct TransferJournal<'a> {
    ledger: &'a mut dyn TokenLedger,
    executed: Vec<Transfer>,
}

impl<'a> TransferJournal<'a> {
    pub fn new(ledger: &'a mut dyn TokenLedger) -> Self {
        Self {
            ledger,
            executed: Vec::new(),
        }
    }

    /// Execute one transfer. Zero-amount transfers are skipped.
    pub fn transfer(&mut self, transfer: Transfer) -> TreasuryResult<()> {
        if transfer.amount == 0 {
            return Ok(());
        }
        self.ledger
            .transfer(&transfer.from, &transfer.to, transfer.amount)
            .map_err(TreasuryError::Transfer)?;
        self.executed.push(transfer);
        Ok(())
    }

    /// Execute every transfer in order; on the first failure, reverse the
    /// ones already executed and return the original error.
    pub fn execute_all(mut self, transfers: &[Transfer]) -> TreasuryResult<Vec<Transfer>> {
        for transfer in transfers {
            if let Err(err) = self.transfer(*transfer) {
                self.rollback()?;
                return Err(err);
            }
        }
        Ok(self.executed)
    }

    /// Reverse executed transfers, newest first. A failing reversal leaves
    /// the ledger and treasury out of sync, which is unrecoverable.
    pub fn rollback(mut self) -> TreasuryResult<()> {
        while let Some(done) = self.executed.pop() {
            debug!(
                target: "treasury",
                "Reversing transfer of {} from {} to {}",
                done.amount, done.from, done.to
            );
            if let Err(err) = self.ledger.transfer(&done.to, &done.from, done.amount) {
                error!(target: "treasury", "Transfer reversal failed: {err}");
                return Err(TreasuryError::Invariant(format!(
                    "could not reverse transfer of {} from {} to {}: {err}",
                    done.amount, done.from, done.to
                )));
            }
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// In-memory implementation (for node runtime or testing)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryTokenLedger {
    balances: BTreeMap<Address, TokenAmount>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` out of thin air, for genesis allocations and tests.
    pub fn mint(&mut self, address: &Address, amount: TokenAmount) {
        let balance = self.balances.entry(*address).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> TokenAmount {
        self.balances.values().sum()
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn transfer(&mut self, from: &Address, to: &Address, amount: TokenAmount) -> Result<()> {
        let from_balance = self.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(anyhow!(
                "Insufficient balance in {from}: have {from_balance}, need {amount}"
            ));
        }
        self.balances.insert(*from, from_balance - amount);
        let to_balance = self.balances.entry(*to).or_insert(0);
        *to_balance = to_balance
            .checked_add(amount)
            .ok_or_else(|| anyhow!("Balance overflow for {to}"))?;
        Ok(())
    }

    fn balance(&self, address: &Address) -> Result<TokenAmount> {
        Ok(self.balances.get(address).copied().unwrap_or(0))
    }
}

// -----------------------------------------------------------------------------
// Mock ledger (for deterministic testing and simulation)
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct MockTokenLedger {
    inner: InMemoryTokenLedger,
    transfer_calls: Vec<Transfer>,
    failing_recipients: HashSet<Address>,
}

impl MockTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, address: &Address, amount: TokenAmount) {
        self.inner.mint(address, amount);
    }

    /// Every successful transfer, reversals included, in call order.
    pub fn get_transfer_calls(&self) -> &[Transfer] {
        &self.transfer_calls
    }

    pub fn clear_calls(&mut self) {
        self.transfer_calls.clear();
    }

    /// Make every transfer to `address` fail until [`Self::heal`] is called.
    pub fn fail_transfers_to(&mut self, address: Address) {
        self.failing_recipients.insert(address);
    }

    pub fn heal(&mut self) {
        self.failing_recipients.clear();
    }
}

impl TokenLedger for MockTokenLedger {
    fn transfer(&mut self, from: &Address, to: &Address, amount: TokenAmount) -> Result<()> {
        if self.failing_recipients.contains(to) {
            return Err(anyhow!("Injected transfer failure to {to}"));
        }
        self.inner.transfer(from, to, amount)?;
        self.transfer_calls.push(Transfer::new(*from, *to, amount));
        Ok(())
    }

    fn balance(&self, address: &Address) -> Result<TokenAmount> {
        self.inner.balance(address)
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address([n; 32])
    }

    #[test]
    fn test_in_memory_ledger_transfer() {
        let mut ledger = InMemoryTokenLedger::new();
        ledger.mint(&addr(1), 1000);

        ledger.transfer(&addr(1), &addr(2), 300).unwrap();
        assert_eq!(ledger.balance(&addr(1)).unwrap(), 700);
        assert_eq!(ledger.balance(&addr(2)).unwrap(), 300);
        assert_eq!(ledger.total_supply(), 1000);
    }

    #[test]
    fn test_insufficient_balance() {
        let mut ledger = InMemoryTokenLedger::new();
        ledger.mint(&addr(1), 100);

        let result = ledger.transfer(&addr(1), &addr(2), 150);
        assert!(result.is_err());
        assert_eq!(ledger.balance(&addr(1)).unwrap(), 100);
    }

    #[test]
    fn test_journal_rolls_back_on_failure() {
        let mut mock = MockTokenLedger::new();
        mock.mint(&addr(1), 1000);
        mock.fail_transfers_to(addr(3));

        let transfers = [
            Transfer::new(addr(1), addr(2), 400),
            Transfer::new(addr(1), addr(3), 100),
        ];
        let result = TransferJournal::new(&mut mock).execute_all(&transfers);
        assert!(matches!(result, Err(TreasuryError::Transfer(_))));

        assert_eq!(mock.balance(&addr(1)).unwrap(), 1000);
        assert_eq!(mock.balance(&addr(2)).unwrap(), 0);
        // forward transfer plus its reversal
        assert_eq!(
            mock.get_transfer_calls(),
            &[
                Transfer::new(addr(1), addr(2), 400),
                Transfer::new(addr(2), addr(1), 400)
            ]
        );

        mock.heal();
        mock.clear_calls();
        let executed = TransferJournal::new(&mut mock).execute_all(&transfers).unwrap();
        assert_eq!(executed.len(), 2);
        assert_eq!(mock.balance(&addr(3)).unwrap(), 100);
    }

    #[test]
    fn test_journal_skips_zero_amounts() {
        let mut mock = MockTokenLedger::new();
        let executed = TransferJournal::new(&mut mock)
            .execute_all(&[Transfer::new(addr(1), addr(2), 0)])
            .unwrap();
        assert!(executed.is_empty());
        assert!(mock.get_transfer_calls().is_empty());
    }
}
