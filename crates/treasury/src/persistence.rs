//! Mapping of [`TreasuryState`] onto a keyed store
//!
//! | keyspace            | key                          | value               |
//! |---------------------|------------------------------|---------------------|
//! | `pools`             | `name` / `savings`           | [`PoolHeader`]      |
//! | `participants`      | pool tag ‖ address           | [`ParticipantAccount`] |
//! | `escrow`            | pool tag ‖ address           | `Dec`               |
//! | `leftovers`         | pool tag ‖ address           | `Dec`               |
//! | `schedule`          | due time (BE) ‖ address      | empty               |
//! | `validator_rewards` | operator address             | `Dec`               |
//! | `globals`           | `freeze_deadline`, `carry_remainder`, `block_time` | JSON |
//!
//! Values are JSON. A save replaces the whole stored state in one atomic
//! batch. Singletons are written at genesis; finding one missing on load
//! means the store is corrupt.

use crate::errors::{Result, TreasuryError};
use crate::escrow::PayoutBook;
use crate::name_pool::NamePool;
use crate::receipts::PoolKind;
use crate::remainder::LeftoverLedger;
use crate::savings_pool::SavingsPool;
use crate::schedule::{decode_queue_key, encode_queue_key, TimeQueue};
use crate::share_index::{ParticipantAccount, PoolHeader, SharePool};
use crate::state::TreasuryState;
use crate::validator_pool::ValidatorRewards;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use tally_storage::{Store, WriteBatch};
use tally_types::{Address, Dec, Timestamp};
use tracing::debug;

pub const POOLS: &str = "pools";
pub const PARTICIPANTS: &str = "participants";
pub const ESCROW: &str = "escrow";
pub const LEFTOVERS: &str = "leftovers";
pub const SCHEDULE: &str = "schedule";
pub const VALIDATOR_REWARDS: &str = "validator_rewards";
pub const GLOBALS: &str = "globals";

const FREEZE_DEADLINE: &[u8] = b"freeze_deadline";
const CARRY_REMAINDER: &[u8] = b"carry_remainder";
const BLOCK_TIME: &[u8] = b"block_time";

const ENTRY_KEYSPACES: [&str; 5] = [PARTICIPANTS, ESCROW, LEFTOVERS, SCHEDULE, VALIDATOR_REWARDS];

fn pool_key(kind: PoolKind) -> &'static [u8] {
    match kind {
        PoolKind::Name => b"name",
        PoolKind::Savings => b"savings",
    }
}

fn pool_tag(kind: PoolKind) -> u8 {
    match kind {
        PoolKind::Name => 0,
        PoolKind::Savings => 1,
    }
}

fn tagged_key(kind: PoolKind, address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + address.as_bytes().len());
    key.push(pool_tag(kind));
    key.extend_from_slice(address.as_bytes());
    key
}

fn split_tagged_key(key: &[u8]) -> Result<(PoolKind, Address)> {
    let (tag, rest) = key
        .split_first()
        .ok_or_else(|| TreasuryError::Corrupted("empty pool-tagged key".into()))?;
    let kind = match tag {
        0 => PoolKind::Name,
        1 => PoolKind::Savings,
        other => {
            return Err(TreasuryError::Corrupted(format!("unknown pool tag {other}")));
        }
    };
    let address = Address::from_slice(rest)
        .map_err(|e| TreasuryError::Corrupted(format!("bad address in key: {e}")))?;
    Ok((kind, address))
}

/// Replace the stored treasury state with `state`.
pub fn save_state<S: Store>(store: &S, state: &TreasuryState) -> Result<()> {
    let mut batch = WriteBatch::new();

    // stale entries first; puts below re-create the live ones
    for keyspace in ENTRY_KEYSPACES {
        for (key, _) in store.scan(keyspace)? {
            batch.delete(keyspace, key);
        }
    }

    for (kind, shares, book) in [
        (PoolKind::Name, state.name.shares(), state.name.book()),
        (PoolKind::Savings, state.savings.shares(), state.savings.book()),
    ] {
        batch.put_json(POOLS, pool_key(kind), &PoolHeader::from(shares))?;
        for (address, account) in shares.accounts() {
            batch.put_json(PARTICIPANTS, tagged_key(kind, address), account)?;
        }
        for (address, amount) in book.escrow_entries() {
            batch.put_json(ESCROW, tagged_key(kind, address), amount)?;
        }
        for (address, fraction) in book.leftovers().iter() {
            batch.put_json(LEFTOVERS, tagged_key(kind, address), fraction)?;
        }
    }

    for (due, address) in state.name.queue().iter() {
        batch.put(SCHEDULE, encode_queue_key(due, address), Vec::new());
    }
    for (operator, amount) in state.validators.accumulated() {
        batch.put_json(VALIDATOR_REWARDS, operator.as_bytes().to_vec(), amount)?;
    }

    batch.put_json(GLOBALS, FREEZE_DEADLINE, &state.freeze_deadline)?;
    batch.put_json(GLOBALS, BLOCK_TIME, &state.block_time)?;
    batch.put_json(GLOBALS, CARRY_REMAINDER, &state.validators.carry_remainder())?;

    debug!(target: "treasury", "Persisting treasury state in {} write(s)", batch.len());
    store.write(batch)?;
    Ok(())
}

fn required<S: Store, T: DeserializeOwned>(store: &S, keyspace: &str, key: &[u8]) -> Result<T> {
    store.get_json(keyspace, key)?.ok_or_else(|| {
        TreasuryError::Corrupted(format!(
            "missing {}/{}",
            keyspace,
            String::from_utf8_lossy(key)
        ))
    })
}

#[derive(Default)]
struct PoolEntries {
    accounts: BTreeMap<Address, ParticipantAccount>,
    escrow: BTreeMap<Address, Dec>,
    leftovers: BTreeMap<Address, Dec>,
}

fn load_pool_entries<S: Store>(store: &S) -> Result<BTreeMap<PoolKind, PoolEntries>> {
    let mut pools: BTreeMap<PoolKind, PoolEntries> = BTreeMap::new();
    for (key, value) in store.scan(PARTICIPANTS)? {
        let (kind, address) = split_tagged_key(&key)?;
        let account = serde_json::from_slice(&value).map_err(tally_storage::StorageError::from)?;
        pools.entry(kind).or_default().accounts.insert(address, account);
    }
    for (key, value) in store.scan(ESCROW)? {
        let (kind, address) = split_tagged_key(&key)?;
        let amount = serde_json::from_slice(&value).map_err(tally_storage::StorageError::from)?;
        pools.entry(kind).or_default().escrow.insert(address, amount);
    }
    for (key, value) in store.scan(LEFTOVERS)? {
        let (kind, address) = split_tagged_key(&key)?;
        let fraction = serde_json::from_slice(&value).map_err(tally_storage::StorageError::from)?;
        pools.entry(kind).or_default().leftovers.insert(address, fraction);
    }
    Ok(pools)
}

fn assemble_pool<S: Store>(
    store: &S,
    kind: PoolKind,
    entries: PoolEntries,
) -> Result<(SharePool, PayoutBook)> {
    let header: PoolHeader = required(store, POOLS, pool_key(kind))?;
    let shares = SharePool::from_parts(
        header.global_rate,
        header.total_stake,
        header.pending_undistributed,
        header.rate_dust,
        entries.accounts,
    )?;
    let book = PayoutBook::from_parts(
        entries.escrow,
        entries.leftovers.into_iter().collect::<LeftoverLedger>(),
    )?;
    Ok((shares, book))
}

/// Load the state written by [`save_state`].
pub fn load_state<S: Store>(store: &S) -> Result<TreasuryState> {
    let freeze_deadline: Timestamp = required(store, GLOBALS, FREEZE_DEADLINE)?;
    let block_time: Timestamp = required(store, GLOBALS, BLOCK_TIME)?;
    let carry_remainder: Dec = required(store, GLOBALS, CARRY_REMAINDER)?;

    let mut entries = load_pool_entries(store)?;
    let (name_shares, name_book) = assemble_pool(
        store,
        PoolKind::Name,
        entries.remove(&PoolKind::Name).unwrap_or_default(),
    )?;
    let (savings_shares, savings_book) = assemble_pool(
        store,
        PoolKind::Savings,
        entries.remove(&PoolKind::Savings).unwrap_or_default(),
    )?;

    let mut queue = TimeQueue::new();
    let mut seen = BTreeSet::new();
    for (key, _) in store.scan(SCHEDULE)? {
        let (due, address) = decode_queue_key::<Address>(&key)
            .ok_or_else(|| TreasuryError::Corrupted("undecodable schedule key".into()))?;
        if !seen.insert(address) {
            return Err(TreasuryError::Corrupted(format!(
                "{address} scheduled more than once"
            )));
        }
        queue.insert(address, due);
    }

    let mut accumulated = BTreeMap::new();
    for (key, value) in store.scan(VALIDATOR_REWARDS)? {
        let operator = Address::from_slice(&key)
            .map_err(|e| TreasuryError::Corrupted(format!("bad validator key: {e}")))?;
        let amount = serde_json::from_slice(&value).map_err(tally_storage::StorageError::from)?;
        accumulated.insert(operator, amount);
    }

    let state = TreasuryState {
        freeze_deadline,
        block_time,
        name: NamePool::from_parts(name_shares, queue, name_book)?,
        savings: SavingsPool::from_parts(savings_shares, savings_book)?,
        validators: ValidatorRewards::from_parts(accumulated, carry_remainder)?,
    };
    state.validate()?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_storage::MemoryStore;

    fn addr(n: u8) -> Address {
        Address([n; 32])
    }

    fn sample_state() -> TreasuryState {
        let mut state = TreasuryState::new(Timestamp(1_000));
        state.block_time = Timestamp(20);
        state.name.schedule(addr(1), Timestamp(30));
        state.name.schedule(addr(2), Timestamp(10));
        state.name.activate_due(Timestamp(20)).unwrap();
        state.name.distribute(7).unwrap();
        state.savings.commit_deposit(addr(3), 40).unwrap();
        state.savings.distribute(3).unwrap();
        state
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = MemoryStore::new();
        let state = sample_state();
        save_state(&store, &state).unwrap();
        assert_eq!(load_state(&store).unwrap(), state);
    }

    #[test]
    fn test_save_drops_stale_entries() {
        let store = MemoryStore::new();
        let mut state = sample_state();
        save_state(&store, &state).unwrap();

        state.name.cancel_scheduled(&addr(1));
        save_state(&store, &state).unwrap();
        assert!(store.scan(SCHEDULE).unwrap().is_empty());
        assert_eq!(load_state(&store).unwrap(), state);
    }

    #[test]
    fn test_missing_singleton_is_fatal() {
        let store = MemoryStore::new();
        save_state(&store, &sample_state()).unwrap();
        let mut batch = WriteBatch::new();
        batch.delete(POOLS, b"savings".to_vec());
        store.write(batch).unwrap();

        let err = load_state(&store).unwrap_err();
        assert!(matches!(err, TreasuryError::Corrupted(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_store_is_not_defaulted() {
        assert!(matches!(
            load_state(&MemoryStore::new()),
            Err(TreasuryError::Corrupted(_))
        ));
    }
}
