//! Vote token ledger.
//!
//! Balances, delegation, and a checkpointed history of each delegate's
//! voting weight. An account's weight is the sum of the balances of every
//! account currently delegating to it; balance changes follow the
//! delegation, not the holder. Holders start undelegated and carry no
//! weight until they delegate (to themselves or anyone else).

use std::collections::BTreeMap;

use bairro_types::{Address, Amount, BlockNumber};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::call::TokenCall;
use crate::checkpoint::{Checkpoint, Checkpoints};
use crate::error::LedgerError;
use crate::events::{Event, EventLog};
use crate::governor::VotingWeights;
use crate::Context;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteLedger {
    address: Address,
    /// Only the owner may mint
    owner: Address,
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: Amount,
    balances: BTreeMap<Address, Amount>,
    delegates: BTreeMap<Address, Address>,
    checkpoints: BTreeMap<Address, Checkpoints>,
    supply_checkpoints: Checkpoints,
}

impl VoteLedger {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            name: "Vote Token".to_string(),
            symbol: "VOTE".to_string(),
            decimals: bairro_types::DECIMALS as u8,
            total_supply: 0,
            balances: BTreeMap::new(),
            delegates: BTreeMap::new(),
            checkpoints: BTreeMap::new(),
            supply_checkpoints: Checkpoints::new(),
        }
    }

    /// Create new tokens for `to`.
    ///
    /// # Errors
    /// - `Unauthorized` unless the caller is the ledger owner
    /// - `InvalidAmount` for a zero amount
    pub fn mint(
        &mut self,
        ctx: &Context,
        log: &mut EventLog,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if ctx.caller != self.owner {
            return Err(LedgerError::Unauthorized { caller: ctx.caller });
        }
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        let balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        self.supply_checkpoints.push(ctx.block, supply)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        log.emit(
            ctx.block,
            self.address,
            Event::Transfer { from: None, to, amount },
        );
        info!(to = %to.short(), amount, supply, block = ctx.block, "minted vote tokens");

        let delegate = self.delegates(&to);
        self.move_delegate_votes(ctx.block, log, None, delegate, amount)
    }

    /// Move `amount` from the caller to `to`.
    ///
    /// # Errors
    /// - `InvalidAmount` for a zero amount
    /// - `InsufficientBalance` if the caller holds less than `amount`
    pub fn transfer(
        &mut self,
        ctx: &Context,
        log: &mut EventLog,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let from = ctx.caller;
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let available = self.balance_of(&from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from,
                available,
                required: amount,
            });
        }

        if from != to {
            let credited = self
                .balance_of(&to)
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?;
            self.balances.insert(from, available - amount);
            self.balances.insert(to, credited);
        }
        log.emit(
            ctx.block,
            self.address,
            Event::Transfer { from: Some(from), to, amount },
        );
        debug!(from = %from.short(), to = %to.short(), amount, "transferred vote tokens");

        let src = self.delegates(&from);
        let dst = self.delegates(&to);
        self.move_delegate_votes(ctx.block, log, src, dst, amount)
    }

    /// Point the caller's voting weight at `to`.
    ///
    /// Re-delegating to the current delegate changes nothing.
    pub fn delegate(
        &mut self,
        ctx: &Context,
        log: &mut EventLog,
        to: Address,
    ) -> Result<(), LedgerError> {
        let account = ctx.caller;
        let previous = self.delegates(&account);
        if previous == Some(to) {
            debug!(account = %account.short(), "delegation unchanged");
            return Ok(());
        }

        self.delegates.insert(account, to);
        log.emit(
            ctx.block,
            self.address,
            Event::DelegateChanged {
                delegator: account,
                from_delegate: previous,
                to_delegate: to,
            },
        );
        info!(account = %account.short(), delegate = %to.short(), block = ctx.block, "delegated votes");

        let balance = self.balance_of(&account);
        self.move_delegate_votes(ctx.block, log, previous, Some(to), balance)
    }

    fn move_delegate_votes(
        &mut self,
        block: BlockNumber,
        log: &mut EventLog,
        src: Option<Address>,
        dst: Option<Address>,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if src == dst || amount == 0 {
            return Ok(());
        }

        if let Some(src) = src {
            let history = self.checkpoints.entry(src).or_default();
            let current = history
                .latest()
                .checked_sub(amount)
                .ok_or(LedgerError::Overflow)?;
            let previous = history.push(block, current)?;
            log.emit(
                block,
                self.address,
                Event::DelegateVotesChanged { delegate: src, previous, current },
            );
        }

        if let Some(dst) = dst {
            let history = self.checkpoints.entry(dst).or_default();
            let current = history
                .latest()
                .checked_add(amount)
                .ok_or(LedgerError::Overflow)?;
            let previous = history.push(block, current)?;
            log.emit(
                block,
                self.address,
                Event::DelegateVotesChanged { delegate: dst, previous, current },
            );
        }

        Ok(())
    }

    /// Checkpointed weight of `account` at `at_block`.
    ///
    /// # Errors
    /// `FutureBlock` unless `at_block < current_block`: the current block
    /// may still change.
    pub fn get_votes(
        &self,
        account: &Address,
        at_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<Amount, LedgerError> {
        VotingWeights::get_votes(self, account, at_block, current_block)
    }

    /// Total supply at `at_block`, with the same finality rule as `get_votes`.
    pub fn get_past_total_supply(
        &self,
        at_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<Amount, LedgerError> {
        if at_block >= current_block {
            return Err(LedgerError::FutureBlock {
                requested: at_block,
                current: current_block,
            });
        }
        Ok(self.supply_checkpoints.upper_lookup(at_block))
    }

    /// Apply a decoded call made on behalf of `ctx.caller`.
    pub fn handle_call(
        &mut self,
        ctx: &Context,
        log: &mut EventLog,
        call: TokenCall,
    ) -> Result<(), LedgerError> {
        match call {
            TokenCall::Mint { to, amount } => self.mint(ctx, log, to, amount),
            TokenCall::Transfer { to, amount } => self.transfer(ctx, log, to, amount),
            TokenCall::Delegate { to } => self.delegate(ctx, log, to),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Current delegate of `account`, if it has delegated at all.
    pub fn delegates(&self, account: &Address) -> Option<Address> {
        self.delegates.get(account).copied()
    }

    pub fn current_votes(&self, account: &Address) -> Amount {
        self.checkpoints.get(account).map_or(0, Checkpoints::latest)
    }

    pub fn num_checkpoints(&self, account: &Address) -> usize {
        self.checkpoints.get(account).map_or(0, Checkpoints::len)
    }

    pub fn checkpoint(&self, account: &Address, index: usize) -> Option<Checkpoint> {
        self.checkpoints.get(account)?.get(index).copied()
    }

    /// Iterate over all non-zero balances.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter().filter(|(_, b)| **b > 0)
    }
}

impl VotingWeights for VoteLedger {
    fn votes_at(&self, account: &Address, block: BlockNumber) -> Amount {
        self.checkpoints
            .get(account)
            .map_or(0, |history| history.upper_lookup(block))
    }

    fn total_supply_at(&self, block: BlockNumber) -> Amount {
        self.supply_checkpoints.upper_lookup(block)
    }
}
