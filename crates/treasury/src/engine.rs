//! Treasury engine
//!
//! Ties the pools to the host chain: the per-block driver, the transaction
//! handlers, the eligibility hooks and the read-only queries.
//!
//! Every handler follows the same shape. It plans against the current state
//! without mutating it, runs the resulting transfers through a
//! [`TransferJournal`], and commits the plan only once every transfer went
//! through. A handler that returns an error has changed nothing.

use crate::account_ledger::{TokenLedger, Transfer, TransferJournal};
use crate::config::TreasuryConfig;
use crate::errors::{Result, TreasuryError};
use crate::escrow::{PayoutBook, PayoutOutcome};
use crate::hooks::NameHooks;
use crate::name_pool::NameRegistry;
use crate::receipts::{
    BeginBlock, BlockReport, NameRewardWithdrawn, PoolInfo, PoolKind, SavingsDeposited,
    SavingsInterestWithdrawn, SavingsWithdrawn, ValidatorRewardWithdrawn,
};
use crate::share_index::{Distribution, SharePool};
use crate::state::TreasuryState;
use crate::validator_pool::{Allocation, StakingRegistry};
use tally_types::{Address, Dec, Timestamp, TokenAmount};
use tracing::{debug, info};

pub struct Treasury<L: TokenLedger> {
    config: TreasuryConfig,
    state: TreasuryState,
    ledger: L,
    names: Box<dyn NameRegistry>,
    staking: Box<dyn StakingRegistry>,
}

impl<L: TokenLedger> Treasury<L> {
    pub fn new(
        config: TreasuryConfig,
        state: TreasuryState,
        ledger: L,
        names: Box<dyn NameRegistry>,
        staking: Box<dyn StakingRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        state.validate()?;
        Ok(Self {
            config,
            state,
            ledger,
            names,
            staking,
        })
    }

    pub fn config(&self) -> &TreasuryConfig {
        &self.config
    }

    pub fn state(&self) -> &TreasuryState {
        &self.state
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn into_parts(self) -> (TreasuryState, L) {
        (self.state, self.ledger)
    }

    // -------------------------------------------------------------------------
    // Per-block driver
    // -------------------------------------------------------------------------

    /// Runs once per block before any transaction. Every error returned from
    /// here is fatal.
    pub fn begin_block(&mut self, request: &BeginBlock) -> Result<BlockReport> {
        if request.block_time < self.state.block_time {
            return Err(TreasuryError::Invariant(format!(
                "block time went backwards from {} to {}",
                self.state.block_time, request.block_time
            )));
        }
        self.run_begin_block(request)
            .map_err(|e| e.into_fatal("begin_block"))
    }

    fn run_begin_block(&mut self, request: &BeginBlock) -> Result<BlockReport> {
        let accounts = self.config.accounts;
        let allocation = self.state.validators.plan_allocation(
            request.validator_fees,
            &request.voting_powers,
            self.staking.as_ref(),
        )?;

        let mut transfers = vec![
            Transfer::new(
                accounts.fee_collector,
                accounts.name_rewards,
                request.name_pool_funds,
            ),
            Transfer::new(
                accounts.fee_collector,
                accounts.savings_rewards,
                request.savings_pool_funds,
            ),
        ];
        if let Allocation::Allocated {
            fee,
            carry_returned,
            ..
        } = &allocation
        {
            transfers.push(Transfer::new(
                accounts.fee_collector,
                accounts.validator_rewards,
                *fee,
            ));
            transfers.push(Transfer::new(
                accounts.validator_rewards,
                accounts.fee_collector,
                *carry_returned,
            ));
        }
        TransferJournal::new(&mut self.ledger).execute_all(&transfers)?;

        self.state.block_time = request.block_time;
        let name_distribution = self.state.name.distribute(request.name_pool_funds)?;
        let savings_distribution = self.state.savings.distribute(request.savings_pool_funds)?;
        let activated = self.state.name.activate_due(request.block_time)?;
        self.state.validators.commit_allocation(&allocation)?;

        debug!(
            target: "treasury",
            "Block at {}: name {:?}, savings {:?}, {} activation(s)",
            request.block_time,
            name_distribution,
            savings_distribution,
            activated.len()
        );

        Ok(BlockReport {
            block_time: request.block_time,
            name_distribution,
            savings_distribution,
            activated,
            validator_allocation: allocation,
        })
    }

    // -------------------------------------------------------------------------
    // Transaction handlers
    // -------------------------------------------------------------------------

    /// Pay out a name holder's reward. A holder who still owns a name stays
    /// enrolled and starts accruing again from the current rate. An address
    /// that already left the pool can still collect what was escrowed for it.
    pub fn withdraw_name_reward(&mut self, address: &Address) -> Result<NameRewardWithdrawn> {
        self.ensure_unfrozen()?;
        if !self.state.name.shares().is_enrolled(address) {
            let outcome = self
                .release_escrow(PoolKind::Name, address)?
                .ok_or(TreasuryError::NotEnrolled { address: *address })?;
            return Ok(NameRewardWithdrawn {
                address: *address,
                reward: Dec::ZERO,
                outcome,
                reenrolled: false,
            });
        }
        let plan = self.state.name.plan_exit(address, false)?;
        let reenroll = self.names.holds_name(address);

        let transfers: Vec<Transfer> = plan
            .payout
            .transfer_from(&self.config.accounts.name_rewards)
            .into_iter()
            .collect();
        TransferJournal::new(&mut self.ledger).execute_all(&transfers)?;
        let outcome = self.state.name.commit_exit(&plan, reenroll)?;

        info!(
            target: "treasury",
            "Name reward of {} withdrawn by {} (re-enrolled: {})",
            plan.reward, address, reenroll
        );
        Ok(NameRewardWithdrawn {
            address: *address,
            reward: plan.reward,
            outcome,
            reenrolled: reenroll,
        })
    }

    /// Move `amount` from `address` into savings custody and enroll it.
    pub fn deposit_savings(
        &mut self,
        address: &Address,
        amount: TokenAmount,
    ) -> Result<SavingsDeposited> {
        self.state.savings.check_deposit(address, amount)?;
        let deposit = Transfer::new(*address, self.config.accounts.savings_custody, amount);
        TransferJournal::new(&mut self.ledger).execute_all(&[deposit])?;
        self.state.savings.commit_deposit(*address, amount)?;

        info!(target: "treasury", "Savings deposit of {} by {}", amount, address);
        Ok(SavingsDeposited {
            address: *address,
            amount,
        })
    }

    /// Full savings exit. Principal is always refunded; during the freeze
    /// the interest goes to escrow.
    pub fn withdraw_savings(&mut self, address: &Address) -> Result<SavingsWithdrawn> {
        let accounts = self.config.accounts;
        let plan = self.state.savings.plan_exit(address, self.state.is_frozen())?;

        let mut transfers = vec![Transfer::new(
            accounts.savings_custody,
            *address,
            plan.principal,
        )];
        transfers.extend(plan.payout.transfer_from(&accounts.savings_rewards));
        TransferJournal::new(&mut self.ledger).execute_all(&transfers)?;
        let outcome = self.state.savings.commit_exit(&plan, false)?;

        info!(
            target: "treasury",
            "Savings of {} withdrawn by {} with interest {}",
            plan.principal, address, plan.interest
        );
        Ok(SavingsWithdrawn {
            address: *address,
            principal: plan.principal,
            interest: plan.interest,
            outcome,
        })
    }

    /// Pay out interest and keep the principal deposited.
    pub fn withdraw_savings_interest(
        &mut self,
        address: &Address,
    ) -> Result<SavingsInterestWithdrawn> {
        self.ensure_unfrozen()?;
        if !self.state.savings.shares().is_enrolled(address) {
            let outcome = self
                .release_escrow(PoolKind::Savings, address)?
                .ok_or(TreasuryError::NotEnrolled { address: *address })?;
            return Ok(SavingsInterestWithdrawn {
                address: *address,
                interest: Dec::ZERO,
                outcome,
            });
        }
        let plan = self.state.savings.plan_exit(address, false)?;

        let transfers: Vec<Transfer> = plan
            .payout
            .transfer_from(&self.config.accounts.savings_rewards)
            .into_iter()
            .collect();
        TransferJournal::new(&mut self.ledger).execute_all(&transfers)?;
        let outcome = self.state.savings.commit_exit(&plan, true)?;

        info!(
            target: "treasury",
            "Savings interest of {} withdrawn by {}",
            plan.interest, address
        );
        Ok(SavingsInterestWithdrawn {
            address: *address,
            interest: plan.interest,
            outcome,
        })
    }

    /// Pay the whole-unit part of a validator's accumulated reward.
    pub fn withdraw_validator_reward(
        &mut self,
        operator: &Address,
    ) -> Result<ValidatorRewardWithdrawn> {
        self.ensure_unfrozen()?;
        let (paid, remaining) = self.state.validators.plan_withdraw(operator)?;
        let payout = Transfer::new(self.config.accounts.validator_rewards, *operator, paid);
        TransferJournal::new(&mut self.ledger).execute_all(&[payout])?;
        self.state.validators.commit_withdraw(operator, remaining);

        info!(
            target: "treasury",
            "Validator reward of {} withdrawn by {}, {} left accumulated",
            paid, operator, remaining
        );
        Ok(ValidatorRewardWithdrawn {
            operator: *operator,
            paid,
            remaining,
        })
    }

    /// Spread funds parked while the pool had no stake. Never happens on
    /// its own.
    pub fn release_pending_undistributed(&mut self, kind: PoolKind) -> Result<Distribution> {
        let distribution = match kind {
            PoolKind::Name => self.state.name.release_pending()?,
            PoolKind::Savings => self.state.savings.release_pending()?,
        };
        info!(target: "treasury", "Released pending {:?} pool funds: {:?}", kind, distribution);
        Ok(distribution)
    }

    /// Pay out escrow held for an address outside the pool. `None` when
    /// nothing is held.
    fn release_escrow(
        &mut self,
        kind: PoolKind,
        address: &Address,
    ) -> Result<Option<PayoutOutcome>> {
        let Some(plan) = self.book(kind).plan_release(address)? else {
            return Ok(None);
        };
        let custody = match kind {
            PoolKind::Name => self.config.accounts.name_rewards,
            PoolKind::Savings => self.config.accounts.savings_rewards,
        };
        let transfers: Vec<Transfer> = plan.transfer_from(&custody).into_iter().collect();
        TransferJournal::new(&mut self.ledger).execute_all(&transfers)?;
        let outcome = match kind {
            PoolKind::Name => self.state.name.commit_release(&plan),
            PoolKind::Savings => self.state.savings.commit_release(&plan),
        };

        info!(
            target: "treasury",
            "Released {:?} pool escrow of {}: {:?}", kind, address, outcome
        );
        Ok(Some(outcome))
    }

    fn ensure_unfrozen(&self) -> Result<()> {
        if self.state.is_frozen() {
            return Err(TreasuryError::WithdrawalFrozen {
                deadline: self.state.freeze_deadline,
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn pending_name_reward(&self, address: &Address) -> Result<Dec> {
        self.state.name.shares().pending_reward(address)
    }

    pub fn pending_savings_reward(&self, address: &Address) -> Result<Dec> {
        self.state.savings.shares().pending_reward(address)
    }

    pub fn validator_accumulated(&self, operator: &Address) -> Dec {
        self.state.validators.accumulated_of(operator)
    }

    pub fn escrow_balance(&self, kind: PoolKind, address: &Address) -> Dec {
        self.book(kind).escrow_of(address)
    }

    pub fn leftover(&self, kind: PoolKind, address: &Address) -> Dec {
        self.book(kind).leftover_of(address)
    }

    pub fn pool_info(&self, kind: PoolKind) -> PoolInfo {
        let shares = self.shares(kind);
        PoolInfo {
            kind,
            global_rate: shares.global_rate(),
            total_stake: shares.total_stake(),
            pending_undistributed: shares.pending_undistributed(),
            rate_dust: shares.rate_dust(),
            participants: shares.participant_count(),
        }
    }

    pub fn scheduled_enrollment(&self, address: &Address) -> Option<Timestamp> {
        self.state.name.scheduled_at(address)
    }

    pub fn carry_remainder(&self) -> Dec {
        self.state.validators.carry_remainder()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.is_frozen()
    }

    fn book(&self, kind: PoolKind) -> &PayoutBook {
        match kind {
            PoolKind::Name => self.state.name.book(),
            PoolKind::Savings => self.state.savings.book(),
        }
    }

    fn shares(&self, kind: PoolKind) -> &SharePool {
        match kind {
            PoolKind::Name => self.state.name.shares(),
            PoolKind::Savings => self.state.savings.shares(),
        }
    }
}

impl<L: TokenLedger> NameHooks for Treasury<L> {
    /// Schedule enrollment after the grace period.
    fn on_first_eligibility_gained(&mut self, address: &Address) -> Result<()> {
        let due = self
            .state
            .block_time
            .saturating_add_micros(self.config.name_enrollment_grace_us);
        self.state.name.schedule(*address, due);
        Ok(())
    }

    /// Cancel a pending enrollment, or exit the pool and pay out. During
    /// the freeze the reward is escrowed. Once the freeze has lifted, escrow
    /// left over from an earlier exit is paid out as well.
    fn on_last_eligibility_lost(&mut self, address: &Address) -> Result<()> {
        if !self.state.name.shares().is_enrolled(address) {
            let released = if self.state.is_frozen() {
                None
            } else {
                self.release_escrow(PoolKind::Name, address)?
            };
            let cancelled = self.state.name.cancel_scheduled(address).is_some();
            if released.is_none() && !cancelled {
                debug!(target: "treasury", "{} lost eligibility without enrollment", address);
            }
            return Ok(());
        }

        let plan = self.state.name.plan_exit(address, self.state.is_frozen())?;
        let transfers: Vec<Transfer> = plan
            .payout
            .transfer_from(&self.config.accounts.name_rewards)
            .into_iter()
            .collect();
        TransferJournal::new(&mut self.ledger).execute_all(&transfers)?;
        let outcome = self.state.name.commit_exit(&plan, false)?;

        info!(
            target: "treasury",
            "{} left the name pool on losing eligibility: {:?}", address, outcome
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account_ledger::MockTokenLedger;
    use crate::name_pool::StaticNameRegistry;
    use crate::validator_pool::{StaticStakingRegistry, Validator, VotingPower};
    use tally_types::ConsensusId;

    fn addr(n: u8) -> Address {
        Address([n; 32])
    }

    fn units(n: u128) -> Dec {
        Dec::try_from_int(n).unwrap()
    }

    struct Fixture {
        treasury: Treasury<MockTokenLedger>,
        names: StaticNameRegistry,
        staking: StaticStakingRegistry,
    }

    fn fixture(freeze_deadline: u64) -> Fixture {
        let config = TreasuryConfig {
            name_enrollment_grace_us: 10,
            ..TreasuryConfig::default()
        };
        let mut ledger = MockTokenLedger::new();
        ledger.mint(&config.accounts.fee_collector, 1_000_000);
        let names = StaticNameRegistry::new();
        let staking = StaticStakingRegistry::new();
        let treasury = Treasury::new(
            config,
            TreasuryState::new(Timestamp(freeze_deadline)),
            ledger,
            Box::new(names.clone()),
            Box::new(staking.clone()),
        )
        .unwrap();
        Fixture {
            treasury,
            names,
            staking,
        }
    }

    fn block(time: u64, name_funds: u128) -> BeginBlock {
        BeginBlock {
            block_time: Timestamp(time),
            name_pool_funds: name_funds,
            ..BeginBlock::default()
        }
    }

    #[test]
    fn test_block_time_must_not_go_backwards() {
        let mut fx = fixture(0);
        fx.treasury.begin_block(&block(100, 0)).unwrap();
        fx.treasury.begin_block(&block(100, 0)).unwrap();
        let err = fx.treasury.begin_block(&block(99, 0)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_name_holder_activates_after_grace() {
        let mut fx = fixture(0);
        fx.names.grant(addr(1));
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        assert_eq!(fx.treasury.scheduled_enrollment(&addr(1)), Some(Timestamp(10)));

        // funds of the activation block are distributed before activation
        let report = fx.treasury.begin_block(&block(10, 40)).unwrap();
        assert_eq!(report.activated, vec![addr(1)]);
        assert_eq!(report.name_distribution, Distribution::Parked { amount: 40 });

        fx.treasury.begin_block(&block(11, 30)).unwrap();
        assert_eq!(fx.treasury.pending_name_reward(&addr(1)).unwrap(), units(30));
    }

    #[test]
    fn test_withdraw_name_reward_reenrolls_holder() {
        let mut fx = fixture(0);
        fx.names.grant(addr(1));
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.begin_block(&block(10, 0)).unwrap();
        fx.treasury.begin_block(&block(11, 25)).unwrap();

        let receipt = fx.treasury.withdraw_name_reward(&addr(1)).unwrap();
        assert!(receipt.reenrolled);
        assert!(matches!(receipt.outcome, PayoutOutcome::Transferred { paid: 25, .. }));
        assert_eq!(fx.treasury.ledger().balance(&addr(1)).unwrap(), 25);
        assert_eq!(fx.treasury.pending_name_reward(&addr(1)).unwrap(), Dec::ZERO);
    }

    #[test]
    fn test_withdrawals_rejected_while_frozen() {
        let mut fx = fixture(1_000);
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.begin_block(&block(10, 5)).unwrap();
        assert!(fx.treasury.is_frozen());

        assert!(matches!(
            fx.treasury.withdraw_name_reward(&addr(1)),
            Err(TreasuryError::WithdrawalFrozen { deadline }) if deadline == Timestamp(1_000)
        ));
        assert!(matches!(
            fx.treasury.withdraw_validator_reward(&addr(1)),
            Err(TreasuryError::WithdrawalFrozen { .. })
        ));
    }

    #[test]
    fn test_losing_name_before_activation_cancels() {
        let mut fx = fixture(0);
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.on_last_eligibility_lost(&addr(1)).unwrap();
        let report = fx.treasury.begin_block(&block(10, 0)).unwrap();
        assert!(report.activated.is_empty());
        // no-op for an address the pool never saw
        fx.treasury.on_last_eligibility_lost(&addr(2)).unwrap();
    }

    #[test]
    fn test_failed_transfer_leaves_state_untouched() {
        let mut fx = fixture(0);
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.begin_block(&block(10, 0)).unwrap();
        fx.treasury.begin_block(&block(11, 9)).unwrap();

        let before = fx.treasury.state().clone();
        fx.treasury.ledger_mut().fail_transfers_to(addr(1));
        assert!(matches!(
            fx.treasury.withdraw_name_reward(&addr(1)),
            Err(TreasuryError::Transfer(_))
        ));
        assert_eq!(fx.treasury.state(), &before);

        fx.treasury.ledger_mut().heal();
        let receipt = fx.treasury.withdraw_name_reward(&addr(1)).unwrap();
        assert!(matches!(receipt.outcome, PayoutOutcome::Transferred { paid: 9, .. }));
    }

    #[test]
    fn test_name_escrow_collectable_after_leaving_pool() {
        let mut fx = fixture(100);
        fx.names.grant(addr(1));
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.begin_block(&block(10, 0)).unwrap();
        fx.treasury.begin_block(&block(11, 7)).unwrap();

        fx.names.revoke(&addr(1));
        fx.treasury.on_last_eligibility_lost(&addr(1)).unwrap();
        assert_eq!(fx.treasury.escrow_balance(PoolKind::Name, &addr(1)), units(7));
        assert!(matches!(
            fx.treasury.withdraw_name_reward(&addr(1)),
            Err(TreasuryError::WithdrawalFrozen { .. })
        ));

        fx.treasury.begin_block(&block(200, 0)).unwrap();
        let receipt = fx.treasury.withdraw_name_reward(&addr(1)).unwrap();
        assert_eq!(receipt.reward, Dec::ZERO);
        assert!(!receipt.reenrolled);
        assert_eq!(
            receipt.outcome,
            PayoutOutcome::Transferred {
                paid: 7,
                released_escrow: units(7),
                leftover: Dec::ZERO,
            }
        );
        assert_eq!(fx.treasury.ledger().balance(&addr(1)).unwrap(), 7);
        assert_eq!(fx.treasury.escrow_balance(PoolKind::Name, &addr(1)), Dec::ZERO);
        assert!(matches!(
            fx.treasury.withdraw_name_reward(&addr(1)),
            Err(TreasuryError::NotEnrolled { .. })
        ));
    }

    #[test]
    fn test_losing_name_again_after_freeze_pays_old_escrow() {
        let mut fx = fixture(100);
        fx.names.grant(addr(1));
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.begin_block(&block(10, 0)).unwrap();
        fx.treasury.begin_block(&block(11, 7)).unwrap();
        fx.names.revoke(&addr(1));
        fx.treasury.on_last_eligibility_lost(&addr(1)).unwrap();

        // regained after the freeze, lost again before the grace period ends
        fx.treasury.begin_block(&block(100, 0)).unwrap();
        fx.names.grant(addr(1));
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.names.revoke(&addr(1));
        fx.treasury.on_last_eligibility_lost(&addr(1)).unwrap();

        assert_eq!(fx.treasury.scheduled_enrollment(&addr(1)), None);
        assert_eq!(fx.treasury.escrow_balance(PoolKind::Name, &addr(1)), Dec::ZERO);
        assert_eq!(fx.treasury.ledger().balance(&addr(1)).unwrap(), 7);
    }

    #[test]
    fn test_failed_escrow_release_keeps_schedule() {
        let mut fx = fixture(100);
        fx.names.grant(addr(1));
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        fx.treasury.begin_block(&block(10, 0)).unwrap();
        fx.treasury.begin_block(&block(11, 7)).unwrap();
        fx.names.revoke(&addr(1));
        fx.treasury.on_last_eligibility_lost(&addr(1)).unwrap();

        fx.treasury.begin_block(&block(100, 0)).unwrap();
        fx.treasury.on_first_eligibility_gained(&addr(1)).unwrap();
        let before = fx.treasury.state().clone();
        fx.treasury.ledger_mut().fail_transfers_to(addr(1));
        assert!(matches!(
            fx.treasury.on_last_eligibility_lost(&addr(1)),
            Err(TreasuryError::Transfer(_))
        ));
        assert_eq!(fx.treasury.state(), &before);
        assert_eq!(fx.treasury.scheduled_enrollment(&addr(1)), Some(Timestamp(110)));
    }

    #[test]
    fn test_savings_escrow_collectable_after_full_exit() {
        let mut fx = fixture(50);
        fx.treasury.ledger_mut().mint(&addr(7), 100);
        fx.treasury.deposit_savings(&addr(7), 100).unwrap();
        fx.treasury
            .begin_block(&BeginBlock {
                block_time: Timestamp(1),
                savings_pool_funds: 9,
                ..BeginBlock::default()
            })
            .unwrap();
        fx.treasury.withdraw_savings(&addr(7)).unwrap();
        assert_eq!(fx.treasury.escrow_balance(PoolKind::Savings, &addr(7)), units(9));

        fx.treasury.begin_block(&block(50, 0)).unwrap();
        let receipt = fx.treasury.withdraw_savings_interest(&addr(7)).unwrap();
        assert_eq!(receipt.interest, Dec::ZERO);
        assert!(matches!(receipt.outcome, PayoutOutcome::Transferred { paid: 9, .. }));
        assert_eq!(fx.treasury.ledger().balance(&addr(7)).unwrap(), 109);
        assert!(matches!(
            fx.treasury.withdraw_savings_interest(&addr(7)),
            Err(TreasuryError::NotEnrolled { .. })
        ));
    }

    #[test]
    fn test_savings_deposit_and_interest() {
        let mut fx = fixture(0);
        fx.treasury.ledger_mut().mint(&addr(7), 500);
        fx.treasury.deposit_savings(&addr(7), 500).unwrap();
        assert!(matches!(
            fx.treasury.deposit_savings(&addr(7), 1),
            Err(TreasuryError::AlreadyEnrolled { .. })
        ));

        fx.treasury
            .begin_block(&BeginBlock {
                block_time: Timestamp(1),
                savings_pool_funds: 12,
                ..BeginBlock::default()
            })
            .unwrap();
        let receipt = fx.treasury.withdraw_savings_interest(&addr(7)).unwrap();
        assert_eq!(receipt.interest, units(12));
        assert_eq!(fx.treasury.ledger().balance(&addr(7)).unwrap(), 12);
        assert_eq!(fx.treasury.pool_info(PoolKind::Savings).total_stake, 500);

        let receipt = fx.treasury.withdraw_savings(&addr(7)).unwrap();
        assert_eq!(receipt.principal, 500);
        assert_eq!(fx.treasury.ledger().balance(&addr(7)).unwrap(), 512);
    }

    #[test]
    fn test_validator_fees_follow_voting_power() {
        let mut fx = fixture(0);
        for n in [1u8, 2] {
            fx.staking.register(Validator {
                consensus_id: ConsensusId([n; 32]),
                operator: addr(n),
            });
        }
        fx.treasury
            .begin_block(&BeginBlock {
                block_time: Timestamp(1),
                validator_fees: 90,
                voting_powers: vec![
                    VotingPower::new(ConsensusId([1; 32]), 1),
                    VotingPower::new(ConsensusId([2; 32]), 2),
                ],
                ..BeginBlock::default()
            })
            .unwrap();
        assert_eq!(fx.treasury.validator_accumulated(&addr(2)), units(60));

        let receipt = fx.treasury.withdraw_validator_reward(&addr(1)).unwrap();
        assert_eq!(receipt.paid, 30);
        assert!(matches!(
            fx.treasury.withdraw_validator_reward(&addr(1)),
            Err(TreasuryError::NoAccumulatedReward { .. })
        ));
    }

    #[test]
    fn test_unknown_validator_is_fatal() {
        let mut fx = fixture(0);
        let err = fx
            .treasury
            .begin_block(&BeginBlock {
                block_time: Timestamp(1),
                validator_fees: 5,
                voting_powers: vec![VotingPower::new(ConsensusId([9; 32]), 1)],
                ..BeginBlock::default()
            })
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
