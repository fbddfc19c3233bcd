//! Deterministic sequencer.
//!
//! Holds the three components plus the native-funds bank and the event
//! log, and applies one transaction at a time at the current block.
//! A transaction that fails leaves no trace: the state it started from
//! is restored, events included.

use bairro_types::{Address, Amount, BlockNumber, Hash};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bank::Bank;
use crate::call::{CallBundle, GovernorCall, ProposalCall, TokenCall, TreasuryCall};
use crate::config::{token_amount, GovernorConfig};
use crate::error::{CallError, GovernanceError, LedgerError, TreasuryError};
use crate::events::EventLog;
use crate::governor::Governor;
use crate::proposal::{ProposalId, ProposalState};
use crate::reentrancy::ReentrancyGuard;
use crate::treasury::Treasury;
use crate::vote_ledger::VoteLedger;
use crate::Context;

/// Initial token balance for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub account: Address,
    #[serde(with = "token_amount")]
    pub amount: Amount,
}

/// Everything needed to bring up a fresh chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub deployer: Address,
    pub service_provider: Address,
    /// Native funds placed in escrow at deployment
    #[serde(with = "token_amount")]
    pub treasury_funds: Amount,
    /// Have every allocated account delegate to itself
    #[serde(default = "default_self_delegate")]
    pub self_delegate: bool,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub governor: GovernorConfig,
}

fn default_self_delegate() -> bool {
    true
}

impl Deployment {
    pub fn new(deployer: Address, service_provider: Address) -> Self {
        Self {
            deployer,
            service_provider,
            treasury_funds: 0,
            self_delegate: default_self_delegate(),
            allocations: Vec::new(),
            governor: GovernorConfig::default(),
        }
    }

    pub fn with_treasury_funds(mut self, amount: Amount) -> Self {
        self.treasury_funds = amount;
        self
    }

    pub fn allocate(mut self, account: Address, amount: Amount) -> Self {
        self.allocations.push(Allocation { account, amount });
        self
    }

    pub fn with_governor(mut self, config: GovernorConfig) -> Self {
        self.governor = config;
        self
    }

    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.deployer.is_zero() {
            return Err(GovernanceError::InvalidConfig("deployer is the zero address".into()));
        }
        if self.service_provider.is_zero() {
            return Err(GovernanceError::InvalidConfig(
                "service provider is the zero address".into(),
            ));
        }
        if let Some(a) = self.allocations.iter().find(|a| a.account.is_zero()) {
            return Err(GovernanceError::InvalidConfig(format!(
                "allocation of {} to the zero address",
                a.amount
            )));
        }
        self.governor.validate()
    }
}

/// Pre-transaction component state. The event log is append-only, so
/// only its length is kept.
struct Rollback {
    token: VoteLedger,
    treasury: Treasury,
    governor: Governor,
    bank: Bank,
    events: usize,
}

impl Rollback {
    fn take(chain: &Chain) -> Self {
        Self {
            token: chain.token.clone(),
            treasury: chain.treasury.clone(),
            governor: chain.governor.clone(),
            bank: chain.bank.clone(),
            events: chain.events.len(),
        }
    }

    fn restore(self, chain: &mut Chain) {
        chain.token = self.token;
        chain.treasury = self.treasury;
        chain.governor = self.governor;
        chain.bank = self.bank;
        chain.events.truncate(self.events);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    block: BlockNumber,
    deployer: Address,
    token: VoteLedger,
    treasury: Treasury,
    governor: Governor,
    bank: Bank,
    events: EventLog,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

impl Chain {
    /// Deploy the vote ledger, treasury and governor at block 0.
    ///
    /// Component addresses are derived from the deployer (nonces 0, 1, 2).
    /// Treasury control passes to the governor before this returns.
    pub fn deploy(deployment: &Deployment) -> Result<Self, CallError> {
        deployment.validate()?;

        let deployer = deployment.deployer;
        let token_address = Address::contract(&deployer, 0);
        let treasury_address = Address::contract(&deployer, 1);
        let governor_address = Address::contract(&deployer, 2);

        let mut chain = Self {
            block: 0,
            deployer,
            token: VoteLedger::new(token_address, deployer),
            treasury: Treasury::new(treasury_address, deployer, deployment.service_provider),
            governor: Governor::new(
                governor_address,
                token_address,
                deployment.governor.clone(),
            )?,
            bank: Bank::new(),
            events: EventLog::new(),
            guard: ReentrancyGuard::new(),
        };

        let ctx = Context::new(deployer, 0);
        if deployment.treasury_funds > 0 {
            chain.bank.credit(deployer, deployment.treasury_funds)?;
            chain.treasury.deposit(
                &ctx,
                &mut chain.bank,
                &mut chain.events,
                deployment.treasury_funds,
            )?;
        }

        for allocation in &deployment.allocations {
            chain
                .token
                .mint(&ctx, &mut chain.events, allocation.account, allocation.amount)?;
            if deployment.self_delegate {
                chain.token.delegate(
                    &ctx.with_caller(allocation.account),
                    &mut chain.events,
                    allocation.account,
                )?;
            }
        }

        chain
            .treasury
            .transfer_ownership(&ctx, &mut chain.events, governor_address)?;

        info!(
            token = %token_address,
            treasury = %treasury_address,
            governor = %governor_address,
            supply = chain.token.total_supply(),
            escrow = deployment.treasury_funds,
            "Deployed governance components"
        );

        Ok(chain)
    }

    /// Run `op` atomically: on error every change it made is discarded.
    fn transact<T, E>(&mut self, op: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let rollback = Rollback::take(self);
        let result = op(self);
        if result.is_err() {
            debug!(block = self.block, "transaction rolled back");
            rollback.restore(self);
        }
        self.guard.reset();
        result
    }

    fn context(&self, caller: Address) -> Context {
        Context::new(caller, self.block)
    }

    /// Advance the chain by `blocks`.
    pub fn mine(&mut self, blocks: BlockNumber) -> BlockNumber {
        self.block = self.block.saturating_add(blocks);
        self.block
    }

    /// Advance to `block` if it lies ahead; never moves backwards.
    pub fn advance_to(&mut self, block: BlockNumber) -> BlockNumber {
        self.block = self.block.max(block);
        self.block
    }

    // Vote ledger

    pub fn mint(&mut self, caller: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        let ctx = self.context(caller);
        self.transact(|chain| chain.token.mint(&ctx, &mut chain.events, to, amount))
    }

    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let ctx = self.context(caller);
        self.transact(|chain| chain.token.transfer(&ctx, &mut chain.events, to, amount))
    }

    pub fn delegate(&mut self, caller: Address, to: Address) -> Result<(), LedgerError> {
        let ctx = self.context(caller);
        self.transact(|chain| chain.token.delegate(&ctx, &mut chain.events, to))
    }

    pub fn get_votes(&self, account: &Address, at_block: BlockNumber) -> Result<Amount, LedgerError> {
        self.token.get_votes(account, at_block, self.block)
    }

    pub fn get_past_total_supply(&self, at_block: BlockNumber) -> Result<Amount, LedgerError> {
        self.token.get_past_total_supply(at_block, self.block)
    }

    // Treasury

    /// Credit native funds to an account outside any component.
    pub fn fund_account(&mut self, account: Address, amount: Amount) -> Result<(), CallError> {
        self.transact(|chain| Ok(chain.bank.credit(account, amount)?))
    }

    pub fn deposit_to_treasury(&mut self, caller: Address, amount: Amount) -> Result<(), TreasuryError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .treasury
                .deposit(&ctx, &mut chain.bank, &mut chain.events, amount)
        })
    }

    pub fn confirm_completion(&mut self, caller: Address) -> Result<(), TreasuryError> {
        let ctx = self.context(caller);
        self.transact(|chain| chain.treasury.confirm_completion(&ctx, &mut chain.events))
    }

    /// Direct call; succeeds only for the treasury controller.
    pub fn release_initial_payment(
        &mut self,
        caller: Address,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .treasury
                .release_initial_payment(&ctx, &mut chain.bank, &mut chain.events, amount)
        })
    }

    /// Direct call; succeeds only for the treasury controller.
    pub fn release_final_payment(
        &mut self,
        caller: Address,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .treasury
                .release_final_payment(&ctx, &mut chain.bank, &mut chain.events, amount)
        })
    }

    pub fn transfer_treasury_ownership(
        &mut self,
        caller: Address,
        new_controller: Address,
    ) -> Result<(), TreasuryError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .treasury
                .transfer_ownership(&ctx, &mut chain.events, new_controller)
        })
    }

    // Governor

    pub fn propose(
        &mut self,
        caller: Address,
        bundle: CallBundle,
        description: &str,
    ) -> Result<ProposalId, GovernanceError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .governor
                .propose(&ctx, &chain.token, &mut chain.events, bundle, description)
        })
    }

    pub fn cast_vote(
        &mut self,
        caller: Address,
        id: ProposalId,
        support: u8,
    ) -> Result<Amount, GovernanceError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .governor
                .cast_vote(&ctx, &chain.token, &mut chain.events, id, support)
        })
    }

    pub fn cast_vote_with_reason(
        &mut self,
        caller: Address,
        id: ProposalId,
        support: u8,
        reason: &str,
    ) -> Result<Amount, GovernanceError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain.governor.cast_vote_with_reason(
                &ctx,
                &chain.token,
                &mut chain.events,
                id,
                support,
                reason,
            )
        })
    }

    pub fn queue(
        &mut self,
        caller: Address,
        bundle: &CallBundle,
        description_hash: &Hash,
    ) -> Result<ProposalId, GovernanceError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .governor
                .queue(&ctx, &chain.token, &mut chain.events, bundle, description_hash)
        })
    }

    /// Execute a queued proposal.
    ///
    /// The proposal is marked executed first, then each call is dispatched
    /// in order with the governor as caller. If any call fails, the whole
    /// transaction is rolled back and `CallReverted` names the failing call.
    pub fn execute(
        &mut self,
        caller: Address,
        bundle: &CallBundle,
        description_hash: &Hash,
    ) -> Result<ProposalId, GovernanceError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            let id = chain.governor.execute(
                &ctx,
                &chain.token,
                &mut chain.events,
                bundle,
                description_hash,
            )?;
            chain.dispatch(&ctx, bundle)?;
            Ok(id)
        })
    }

    pub fn cancel(&mut self, caller: Address, id: ProposalId) -> Result<(), GovernanceError> {
        let ctx = self.context(caller);
        self.transact(|chain| {
            chain
                .governor
                .cancel(&ctx, &chain.token, &mut chain.events, id)
        })
    }

    pub fn state(&self, id: ProposalId) -> Result<ProposalState, GovernanceError> {
        self.governor.state(&self.token, id, self.block)
    }

    pub fn state_at(&self, id: ProposalId, height: BlockNumber) -> Result<ProposalState, GovernanceError> {
        self.governor.state_at(&self.token, id, height)
    }

    pub fn quorum(&self, at_block: BlockNumber) -> Result<Amount, GovernanceError> {
        self.governor.quorum(&self.token, at_block, self.block)
    }

    fn dispatch(&mut self, ctx: &Context, bundle: &CallBundle) -> Result<(), GovernanceError> {
        let governor = self.governor.address();
        self.guard
            .enter(governor, ctx.caller, 0)
            .map_err(|e| GovernanceError::CallReverted {
                index: 0,
                kind: e.kind(),
                reason: e.to_string(),
            })?;

        for (index, call) in bundle.calls().enumerate() {
            let target = call.target;
            self.dispatch_call(governor, call).map_err(|e| {
                warn!(index, target = %target.short(), error = %e, "proposal call reverted");
                GovernanceError::CallReverted {
                    index,
                    kind: e.kind(),
                    reason: e.to_string(),
                }
            })?;
        }

        self.guard.exit();
        Ok(())
    }

    fn dispatch_call(&mut self, from: Address, call: ProposalCall<'_>) -> Result<(), CallError> {
        self.guard.enter(call.target, from, call.value)?;
        let ctx = self.context(from);

        if call.value > 0 {
            self.bank.transfer(from, call.target, call.value)?;
        }

        let result = if call.target == self.treasury.address() {
            let decoded = TreasuryCall::decode(call.calldata)?;
            self.treasury
                .handle_call(&ctx, &mut self.bank, &mut self.events, decoded)
                .map_err(CallError::from)
        } else if call.target == self.token.address() {
            let decoded = TokenCall::decode(call.calldata)?;
            self.token
                .handle_call(&ctx, &mut self.events, decoded)
                .map_err(CallError::from)
        } else if call.target == self.governor.address() {
            let decoded = GovernorCall::decode(call.calldata)?;
            self.governor
                .handle_call(&ctx, &self.token, &mut self.events, decoded)
                .map_err(CallError::from)
        } else if call.calldata.is_empty() {
            // Plain value transfer to an account
            Ok(())
        } else {
            Err(CallError::NoComponent(call.target))
        };

        self.guard.exit();
        result
    }

    pub fn block(&self) -> BlockNumber {
        self.block
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn token(&self) -> &VoteLedger {
        &self.token
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn treasury_balance(&self) -> Amount {
        self.treasury.balance(&self.bank)
    }
}
