//! Tally Treasury
//!
//! Proportional reward distribution and escrow accounting for the name,
//! savings and validator reward pools. Distribution costs O(1) per block
//! through a share index; payouts move whole units only and carry the
//! fractions forward per address; payouts before the freeze deadline are
//! escrowed and merged into the first payout after it.

pub mod account_ledger;
pub mod config;
pub mod engine;
pub mod errors;
pub mod escrow;
pub mod genesis;
pub mod hooks;
pub mod name_pool;
pub mod persistence;
pub mod receipts;
pub mod remainder;
pub mod savings_pool;
pub mod schedule;
pub mod share_index;
pub mod state;
pub mod validator_pool;

pub use account_ledger::{
    InMemoryTokenLedger, MockTokenLedger, TokenLedger, Transfer, TransferJournal,
};
pub use config::{ModuleAccounts, TreasuryConfig};
pub use engine::Treasury;
pub use errors::{Result, TreasuryError};
pub use escrow::{PayoutBook, PayoutOutcome};
pub use genesis::{export_genesis, import_genesis, load_genesis};
pub use hooks::{NameHookChain, NameHooks};
pub use name_pool::{NamePool, NameRegistry, StaticNameRegistry};
pub use persistence::{load_state, save_state};
pub use receipts::*;
pub use remainder::LeftoverLedger;
pub use savings_pool::SavingsPool;
pub use schedule::{QueueIdentity, TimeQueue};
pub use share_index::{Distribution, ParticipantAccount, SharePool};
pub use state::TreasuryState;
pub use validator_pool::{
    Allocation, StakingRegistry, StaticStakingRegistry, Validator, ValidatorRewards, VotingPower,
};
