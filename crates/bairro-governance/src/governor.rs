//! Proposal lifecycle: propose, vote, queue, execute, cancel.
//!
//! The governor reads voting weight through [`VotingWeights`] and never
//! touches balances itself. Bundle dispatch lives in the sequencer
//! ([`crate::Chain`]); here `execute` only validates and marks the
//! proposal, so the mark is in place before any call runs.

use std::collections::BTreeMap;

use bairro_types::{Address, Amount, BlockNumber, Hash};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::call::{description_hash, CallBundle, GovernorCall};
use crate::config::{GovernorConfig, ZeroWeightPolicy};
use crate::error::{GovernanceError, LedgerError};
use crate::events::{Event, EventLog};
use crate::proposal::{Proposal, ProposalId, ProposalState, Tally, VoteReceipt, VoteSupport};
use crate::Context;

/// Historical voting weight as seen by the governor.
pub trait VotingWeights {
    /// Weight of `account` at the end of `block`, without a recency check.
    fn votes_at(&self, account: &Address, block: BlockNumber) -> Amount;

    /// Total supply at the end of `block`, without a recency check.
    fn total_supply_at(&self, block: BlockNumber) -> Amount;

    /// Weight at a strictly past block.
    fn get_votes(
        &self,
        account: &Address,
        at_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<Amount, LedgerError> {
        if at_block >= current_block {
            return Err(LedgerError::FutureBlock {
                requested: at_block,
                current: current_block,
            });
        }
        Ok(self.votes_at(account, at_block))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Governor {
    address: Address,
    /// Vote ledger the weights come from
    token: Address,
    config: GovernorConfig,
    proposals: BTreeMap<ProposalId, Proposal>,
}

impl Governor {
    pub fn new(
        address: Address,
        token: Address,
        config: GovernorConfig,
    ) -> Result<Self, GovernanceError> {
        config.validate()?;
        Ok(Self {
            address,
            token,
            config,
            proposals: BTreeMap::new(),
        })
    }

    /// Create a proposal.
    ///
    /// The proposer's weight is read at the previous block, so tokens
    /// acquired in the proposing block do not count.
    ///
    /// # Errors
    /// - `InvalidProposal` for an empty or ragged bundle
    /// - `BelowThreshold` if the proposer's weight is under the threshold
    /// - `DuplicateProposal` if the same bundle and description exist
    pub fn propose<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        bundle: CallBundle,
        description: &str,
    ) -> Result<ProposalId, GovernanceError> {
        bundle.validate()?;

        let weight = match ctx.block.checked_sub(1) {
            Some(previous) => weights.get_votes(&ctx.caller, previous, ctx.block)?,
            None => 0,
        };
        if weight < self.config.proposal_threshold {
            return Err(GovernanceError::BelowThreshold {
                weight,
                threshold: self.config.proposal_threshold,
            });
        }

        let description_hash = description_hash(description);
        let id = bundle.proposal_id(&description_hash);
        if self.proposals.contains_key(&id) {
            return Err(GovernanceError::DuplicateProposal(id));
        }

        let snapshot = ctx.block.saturating_add(self.config.voting_delay);
        let deadline = snapshot.saturating_add(self.config.voting_period);

        log.emit(
            ctx.block,
            self.address,
            Event::ProposalCreated {
                id,
                proposer: ctx.caller,
                targets: bundle.targets.clone(),
                values: bundle.values.clone(),
                description: description.to_string(),
                snapshot,
                deadline,
            },
        );
        info!(
            id = %id,
            proposer = %ctx.caller.short(),
            snapshot,
            deadline,
            calls = bundle.len(),
            "Proposal created"
        );

        self.proposals.insert(
            id,
            Proposal {
                id,
                proposer: ctx.caller,
                bundle,
                description: description.to_string(),
                description_hash,
                created_at: ctx.block,
                snapshot,
                deadline,
                tally: Tally::default(),
                receipts: BTreeMap::new(),
                eta: None,
                queued_at: None,
                executed_at: None,
                canceled_at: None,
            },
        );

        Ok(id)
    }

    /// Cast a ballot. `support` is 0 = Against, 1 = For, 2 = Abstain.
    /// Returns the weight counted.
    pub fn cast_vote<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        id: ProposalId,
        support: u8,
    ) -> Result<Amount, GovernanceError> {
        self.record_vote(ctx, weights, log, id, support, None)
    }

    /// Same as [`Governor::cast_vote`], with a free-text reason in the event.
    pub fn cast_vote_with_reason<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        id: ProposalId,
        support: u8,
        reason: &str,
    ) -> Result<Amount, GovernanceError> {
        self.record_vote(ctx, weights, log, id, support, Some(reason.to_string()))
    }

    fn record_vote<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        id: ProposalId,
        support: u8,
        reason: Option<String>,
    ) -> Result<Amount, GovernanceError> {
        let support = VoteSupport::try_from(support)?;
        let state = self.state_at(weights, id, ctx.block)?;
        if state != ProposalState::Active {
            return Err(GovernanceError::InvalidState {
                expected: ProposalState::Active,
                actual: state,
            });
        }

        let zero_weight_votes = self.config.zero_weight_votes;
        let address = self.address;
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;

        if proposal.has_voted(&ctx.caller) {
            return Err(GovernanceError::AlreadyVoted { voter: ctx.caller });
        }

        // Active implies ctx.block > snapshot, so this never reads an open block
        let weight = weights.get_votes(&ctx.caller, proposal.snapshot, ctx.block)?;
        if weight == 0 && zero_weight_votes == ZeroWeightPolicy::Reject {
            return Err(GovernanceError::ZeroWeight { voter: ctx.caller });
        }

        proposal.tally.add(support, weight);
        proposal.receipts.insert(
            ctx.caller,
            VoteReceipt {
                support,
                weight,
                block: ctx.block,
            },
        );

        log.emit(
            ctx.block,
            address,
            Event::VoteCast {
                id,
                voter: ctx.caller,
                support,
                weight,
                reason,
            },
        );
        debug!(id = %id, voter = %ctx.caller.short(), ?support, weight, "Vote cast");

        Ok(weight)
    }

    /// Queue a succeeded proposal for execution after the timelock delay.
    ///
    /// # Errors
    /// - `InvalidProposal` for an empty or ragged bundle
    /// - `IdMismatch` if no proposal has the id derived from the inputs
    /// - `InvalidState` unless the proposal is `Succeeded`
    pub fn queue<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        bundle: &CallBundle,
        description_hash: &Hash,
    ) -> Result<ProposalId, GovernanceError> {
        let id = self.lookup(bundle, description_hash)?;
        let state = self.state_at(weights, id, ctx.block)?;
        if state != ProposalState::Succeeded {
            return Err(GovernanceError::InvalidState {
                expected: ProposalState::Succeeded,
                actual: state,
            });
        }

        let eta = ctx.block.saturating_add(self.config.timelock_delay);
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        proposal.queued_at = Some(ctx.block);
        proposal.eta = Some(eta);

        log.emit(ctx.block, self.address, Event::ProposalQueued { id, eta });
        info!(id = %id, eta, "Proposal queued");

        Ok(id)
    }

    /// Mark a queued proposal executed and return its id.
    ///
    /// The caller dispatches the bundle afterwards; if any call fails the
    /// whole transaction, this mark included, must be discarded.
    ///
    /// # Errors
    /// - `IdMismatch` if no proposal has the id derived from the inputs
    /// - `AlreadyExecuted` on a second execution
    /// - `InvalidState` unless the proposal is `Queued`
    /// - `TimelockNotElapsed` before the eta
    pub fn execute<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        bundle: &CallBundle,
        description_hash: &Hash,
    ) -> Result<ProposalId, GovernanceError> {
        let id = self.lookup(bundle, description_hash)?;
        let state = self.state_at(weights, id, ctx.block)?;
        match state {
            ProposalState::Executed => return Err(GovernanceError::AlreadyExecuted),
            ProposalState::Queued => {}
            actual => {
                return Err(GovernanceError::InvalidState {
                    expected: ProposalState::Queued,
                    actual,
                })
            }
        }

        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        let eta = proposal.eta.unwrap_or(proposal.deadline);
        if ctx.block < eta {
            return Err(GovernanceError::TimelockNotElapsed {
                eta,
                current: ctx.block,
            });
        }
        proposal.executed_at = Some(ctx.block);

        log.emit(ctx.block, self.address, Event::ProposalExecuted { id });
        info!(id = %id, calls = bundle.len(), "Proposal executed");

        Ok(id)
    }

    /// Withdraw a proposal before voting opens. Proposer only.
    pub fn cancel<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        id: ProposalId,
    ) -> Result<(), GovernanceError> {
        let state = self.state_at(weights, id, ctx.block)?;
        let proposal = self
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;

        if proposal.proposer != ctx.caller {
            warn!(id = %id, caller = %ctx.caller.short(), "cancel by non-proposer");
            return Err(GovernanceError::Unauthorized(format!(
                "only the proposer {} may cancel",
                proposal.proposer
            )));
        }
        if state != ProposalState::Pending {
            return Err(GovernanceError::InvalidState {
                expected: ProposalState::Pending,
                actual: state,
            });
        }
        proposal.canceled_at = Some(ctx.block);

        log.emit(ctx.block, self.address, Event::ProposalCanceled { id });
        info!(id = %id, "Proposal canceled");

        Ok(())
    }

    /// Apply a decoded call addressed to the governor.
    pub fn handle_call<W: VotingWeights>(
        &mut self,
        ctx: &Context,
        weights: &W,
        log: &mut EventLog,
        call: GovernorCall,
    ) -> Result<(), GovernanceError> {
        match call {
            GovernorCall::Queue {
                bundle,
                description_hash,
            } => self
                .queue(ctx, weights, log, &bundle, &description_hash)
                .map(|_| ()),
            GovernorCall::Execute {
                bundle,
                description_hash,
            } => self
                .execute(ctx, weights, log, &bundle, &description_hash)
                .map(|_| ()),
            GovernorCall::Cancel { id } => self.cancel(ctx, weights, log, id),
        }
    }

    fn lookup(
        &self,
        bundle: &CallBundle,
        description_hash: &Hash,
    ) -> Result<ProposalId, GovernanceError> {
        bundle.validate()?;
        let id = bundle.proposal_id(description_hash);
        if self.proposals.contains_key(&id) {
            Ok(id)
        } else {
            Err(GovernanceError::IdMismatch(id))
        }
    }

    /// Current state of a proposal.
    pub fn state<W: VotingWeights>(
        &self,
        weights: &W,
        id: ProposalId,
        current_block: BlockNumber,
    ) -> Result<ProposalState, GovernanceError> {
        self.state_at(weights, id, current_block)
    }

    /// State of a proposal as of `height`. Depends only on recorded data,
    /// so past heights can be replayed.
    pub fn state_at<W: VotingWeights>(
        &self,
        weights: &W,
        id: ProposalId,
        height: BlockNumber,
    ) -> Result<ProposalState, GovernanceError> {
        let proposal = self
            .proposals
            .get(&id)
            .ok_or(GovernanceError::UnknownProposal(id))?;
        if height < proposal.created_at {
            return Err(GovernanceError::UnknownProposal(id));
        }
        let quorum = self.quorum_at(weights, proposal.snapshot);
        Ok(proposal.state_at(height, quorum, self.config.grace_period))
    }

    /// Quorum at a strictly past block.
    pub fn quorum<W: VotingWeights>(
        &self,
        weights: &W,
        at_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<Amount, GovernanceError> {
        if at_block >= current_block {
            return Err(LedgerError::FutureBlock {
                requested: at_block,
                current: current_block,
            }
            .into());
        }
        Ok(self.quorum_at(weights, at_block))
    }

    fn quorum_at<W: VotingWeights>(&self, weights: &W, block: BlockNumber) -> Amount {
        self.config.quorum.quorum(weights.total_supply_at(block))
    }

    /// Forward a historical weight query to the vote ledger.
    pub fn get_votes<W: VotingWeights>(
        &self,
        weights: &W,
        account: &Address,
        at_block: BlockNumber,
        current_block: BlockNumber,
    ) -> Result<Amount, GovernanceError> {
        Ok(weights.get_votes(account, at_block, current_block)?)
    }

    /// Id a proposal with this bundle and description hash would have.
    pub fn hash_proposal(&self, bundle: &CallBundle, description_hash: &Hash) -> ProposalId {
        bundle.proposal_id(description_hash)
    }

    fn get(&self, id: &ProposalId) -> Result<&Proposal, GovernanceError> {
        self.proposals
            .get(id)
            .ok_or(GovernanceError::UnknownProposal(*id))
    }

    pub fn proposal(&self, id: &ProposalId) -> Option<&Proposal> {
        self.proposals.get(id)
    }

    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }

    pub fn proposal_snapshot(&self, id: &ProposalId) -> Result<BlockNumber, GovernanceError> {
        Ok(self.get(id)?.snapshot)
    }

    pub fn proposal_deadline(&self, id: &ProposalId) -> Result<BlockNumber, GovernanceError> {
        Ok(self.get(id)?.deadline)
    }

    pub fn proposal_eta(&self, id: &ProposalId) -> Result<Option<BlockNumber>, GovernanceError> {
        Ok(self.get(id)?.eta)
    }

    pub fn proposal_proposer(&self, id: &ProposalId) -> Result<Address, GovernanceError> {
        Ok(self.get(id)?.proposer)
    }

    pub fn has_voted(&self, id: &ProposalId, voter: &Address) -> Result<bool, GovernanceError> {
        Ok(self.get(id)?.has_voted(voter))
    }

    pub fn receipt(
        &self,
        id: &ProposalId,
        voter: &Address,
    ) -> Result<Option<VoteReceipt>, GovernanceError> {
        Ok(self.get(id)?.receipts.get(voter).copied())
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn proposal_threshold(&self) -> Amount {
        self.config.proposal_threshold
    }

    pub fn voting_delay(&self) -> BlockNumber {
        self.config.voting_delay
    }

    pub fn voting_period(&self) -> BlockNumber {
        self.config.voting_period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QuorumRule;
    use bairro_types::UNIT;

    /// Fixed weights, identical at every block.
    #[derive(Default)]
    struct StaticWeights {
        votes: BTreeMap<Address, Amount>,
    }

    impl StaticWeights {
        fn with(mut self, label: &str, amount: Amount) -> Self {
            self.votes.insert(Address::from_label(label), amount);
            self
        }
    }

    impl VotingWeights for StaticWeights {
        fn votes_at(&self, account: &Address, _block: BlockNumber) -> Amount {
            self.votes.get(account).copied().unwrap_or(0)
        }

        fn total_supply_at(&self, _block: BlockNumber) -> Amount {
            self.votes.values().sum()
        }
    }

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    fn at(label: &str, block: BlockNumber) -> Context {
        Context::new(addr(label), block)
    }

    fn config() -> GovernorConfig {
        GovernorConfig {
            voting_delay: 1,
            voting_period: 10,
            proposal_threshold: 1,
            quorum: QuorumRule::Fixed { amount: 20 },
            timelock_delay: 2,
            grace_period: 20,
            zero_weight_votes: ZeroWeightPolicy::RecordReceipt,
        }
    }

    fn governor() -> Governor {
        Governor::new(addr("governor"), addr("token"), config()).unwrap()
    }

    fn bundle() -> CallBundle {
        CallBundle::single(addr("treasury"), vec![1, 2, 3])
    }

    fn voters() -> StaticWeights {
        StaticWeights::default()
            .with("alice", 10)
            .with("bob", 10)
            .with("carol", 10)
            .with("dave", 5)
            .with("erin", 5)
    }

    #[test]
    fn test_propose_sets_window() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let id = gov
            .propose(&at("alice", 5), &voters(), &mut log, bundle(), "fund")
            .unwrap();

        assert_eq!(gov.proposal_snapshot(&id).unwrap(), 6);
        assert_eq!(gov.proposal_deadline(&id).unwrap(), 16);
        assert_eq!(gov.proposal_proposer(&id).unwrap(), addr("alice"));
        assert_eq!(gov.proposal_eta(&id).unwrap(), None);
        assert_eq!(gov.hash_proposal(&bundle(), &description_hash("fund")), id);
        assert_eq!(log.last().unwrap().event.name(), "proposal_created");
    }

    #[test]
    fn test_propose_below_threshold() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let err = gov
            .propose(&at("mallory", 5), &voters(), &mut log, bundle(), "fund")
            .unwrap_err();
        assert_eq!(
            err,
            GovernanceError::BelowThreshold {
                weight: 0,
                threshold: 1
            }
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_propose_at_genesis_has_no_weight() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let err = gov
            .propose(&at("alice", 0), &voters(), &mut log, bundle(), "fund")
            .unwrap_err();
        assert!(matches!(err, GovernanceError::BelowThreshold { weight: 0, .. }));
    }

    #[test]
    fn test_duplicate_proposal() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let id = gov
            .propose(&at("alice", 5), &voters(), &mut log, bundle(), "fund")
            .unwrap();
        let err = gov
            .propose(&at("bob", 6), &voters(), &mut log, bundle(), "fund")
            .unwrap_err();
        assert_eq!(err, GovernanceError::DuplicateProposal(id));

        // A different description is a different proposal
        assert!(gov
            .propose(&at("bob", 6), &voters(), &mut log, bundle(), "fund again")
            .is_ok());
    }

    #[test]
    fn test_empty_bundle_rejected() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let err = gov
            .propose(&at("alice", 5), &voters(), &mut log, CallBundle::new(), "x")
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProposal(_)));
    }

    #[test]
    fn test_vote_outside_window() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();

        let err = gov.cast_vote(&at("bob", 5), &w, &mut log, id, 1).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidState { actual: ProposalState::Pending, .. }
        ));

        // Snapshot block: weights there are not final yet
        let err = gov.cast_vote(&at("bob", 6), &w, &mut log, id, 1).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::InvalidState {
                expected: ProposalState::Active,
                actual: ProposalState::Pending
            }
        );

        let err = gov.cast_vote(&at("bob", 17), &w, &mut log, id, 1).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidState { .. }));
    }

    #[test]
    fn test_double_vote_and_bad_support() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();

        assert_eq!(gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap(), 10);
        let err = gov.cast_vote(&at("bob", 8), &w, &mut log, id, 0).unwrap_err();
        assert_eq!(err, GovernanceError::AlreadyVoted { voter: addr("bob") });

        let err = gov.cast_vote(&at("carol", 8), &w, &mut log, id, 7).unwrap_err();
        assert_eq!(err, GovernanceError::InvalidSupport(7));
        assert!(!gov.has_voted(&id, &addr("carol")).unwrap());

        let receipt = gov.receipt(&id, &addr("bob")).unwrap().unwrap();
        assert_eq!(receipt.support, VoteSupport::For);
        assert_eq!(receipt.weight, 10);
        assert_eq!(receipt.block, 7);
    }

    #[test]
    fn test_vote_on_unknown_proposal() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let id = Hash::compute(b"nothing");
        let err = gov.cast_vote(&at("bob", 7), &voters(), &mut log, id, 1).unwrap_err();
        assert_eq!(err, GovernanceError::UnknownProposal(id));
    }

    #[test]
    fn test_zero_weight_policies() {
        let w = voters();
        let mut log = EventLog::new();

        let mut gov = governor();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        assert_eq!(gov.cast_vote(&at("nobody", 7), &w, &mut log, id, 1).unwrap(), 0);
        assert!(gov.has_voted(&id, &addr("nobody")).unwrap());

        let mut strict = Governor::new(
            addr("governor"),
            addr("token"),
            GovernorConfig {
                zero_weight_votes: ZeroWeightPolicy::Reject,
                ..config()
            },
        )
        .unwrap();
        let id = strict.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        let err = strict.cast_vote(&at("nobody", 7), &w, &mut log, id, 1).unwrap_err();
        assert_eq!(err, GovernanceError::ZeroWeight { voter: addr("nobody") });
        assert!(!strict.has_voted(&id, &addr("nobody")).unwrap());
    }

    #[test]
    fn test_five_voter_tally_succeeds() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();

        gov.cast_vote(&at("alice", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("carol", 7), &w, &mut log, id, 0).unwrap();
        gov.cast_vote(&at("dave", 8), &w, &mut log, id, 2).unwrap();
        gov.cast_vote_with_reason(&at("erin", 9), &w, &mut log, id, 1, "ship it")
            .unwrap();

        let tally = gov.proposal(&id).unwrap().tally;
        assert_eq!(tally.for_votes, 25);
        assert_eq!(tally.against_votes, 10);
        assert_eq!(tally.abstain_votes, 5);
        assert_eq!(gov.state(&w, id, 16).unwrap(), ProposalState::Active);
        assert_eq!(gov.state(&w, id, 17).unwrap(), ProposalState::Succeeded);
    }

    #[test]
    fn test_quorum_not_reached() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        gov.cast_vote(&at("alice", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("dave", 7), &w, &mut log, id, 2).unwrap();
        // 10 for + 5 abstain < 20
        assert_eq!(gov.state(&w, id, 17).unwrap(), ProposalState::Defeated);
    }

    #[test]
    fn test_queue_execute_flow() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let b = bundle();
        let dh = description_hash("fund");
        let id = gov.propose(&at("alice", 5), &w, &mut log, b.clone(), "fund").unwrap();
        gov.cast_vote(&at("alice", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap();

        // Still active
        let err = gov.queue(&at("anyone", 16), &w, &mut log, &b, &dh).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidState { .. }));

        assert_eq!(gov.queue(&at("anyone", 17), &w, &mut log, &b, &dh).unwrap(), id);
        assert_eq!(gov.proposal_eta(&id).unwrap(), Some(19));
        assert_eq!(gov.state(&w, id, 17).unwrap(), ProposalState::Queued);

        let err = gov.execute(&at("anyone", 18), &w, &mut log, &b, &dh).unwrap_err();
        assert_eq!(err, GovernanceError::TimelockNotElapsed { eta: 19, current: 18 });

        assert_eq!(gov.execute(&at("anyone", 19), &w, &mut log, &b, &dh).unwrap(), id);
        assert_eq!(gov.state(&w, id, 19).unwrap(), ProposalState::Executed);

        let err = gov.execute(&at("anyone", 20), &w, &mut log, &b, &dh).unwrap_err();
        assert_eq!(err, GovernanceError::AlreadyExecuted);

        // History is preserved
        assert_eq!(gov.state_at(&w, id, 18).unwrap(), ProposalState::Queued);
        assert_eq!(gov.state_at(&w, id, 10).unwrap(), ProposalState::Active);
    }

    #[test]
    fn test_queue_with_wrong_inputs() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();

        let wrong = description_hash("fund!");
        let err = gov.queue(&at("anyone", 17), &w, &mut log, &bundle(), &wrong).unwrap_err();
        assert_eq!(err, GovernanceError::IdMismatch(bundle().proposal_id(&wrong)));

        let err = gov.execute(&at("anyone", 17), &w, &mut log, &bundle(), &wrong).unwrap_err();
        assert!(matches!(err, GovernanceError::IdMismatch(_)));
    }

    #[test]
    fn test_execute_requires_queue() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let dh = description_hash("fund");
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        gov.cast_vote(&at("alice", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap();

        let err = gov.execute(&at("anyone", 17), &w, &mut log, &bundle(), &dh).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::InvalidState {
                expected: ProposalState::Queued,
                actual: ProposalState::Succeeded
            }
        );
    }

    #[test]
    fn test_expiry() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let b = bundle();
        let dh = description_hash("fund");
        let id = gov.propose(&at("alice", 5), &w, &mut log, b.clone(), "fund").unwrap();
        gov.cast_vote(&at("alice", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap();

        // deadline 16 + grace 20
        assert_eq!(gov.state(&w, id, 36).unwrap(), ProposalState::Succeeded);
        assert_eq!(gov.state(&w, id, 37).unwrap(), ProposalState::Expired);
        let err = gov.queue(&at("anyone", 37), &w, &mut log, &b, &dh).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidState { actual: ProposalState::Expired, .. }
        ));
    }

    #[test]
    fn test_cancel() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();

        let err = gov.cancel(&at("bob", 5), &w, &mut log, id).unwrap_err();
        assert!(matches!(err, GovernanceError::Unauthorized(_)));

        gov.cancel(&at("alice", 5), &w, &mut log, id).unwrap();
        assert_eq!(gov.state(&w, id, 10).unwrap(), ProposalState::Canceled);

        let err = gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::InvalidState { actual: ProposalState::Canceled, .. }
        ));
    }

    #[test]
    fn test_cancel_after_voting_opens() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        // Still pending through the snapshot block
        assert_eq!(gov.state(&w, id, 6).unwrap(), ProposalState::Pending);
        let err = gov.cancel(&at("alice", 7), &w, &mut log, id).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::InvalidState {
                expected: ProposalState::Pending,
                actual: ProposalState::Active
            }
        );
    }

    #[test]
    fn test_quorum_guard() {
        let gov = governor();
        let w = voters();
        assert_eq!(gov.quorum(&w, 4, 5).unwrap(), 20);
        assert!(matches!(
            gov.quorum(&w, 5, 5),
            Err(GovernanceError::Ledger(LedgerError::FutureBlock { .. }))
        ));
        assert_eq!(gov.get_votes(&w, &addr("alice"), 1, 2).unwrap(), 10);
    }

    #[test]
    fn test_fractional_quorum() {
        let gov = Governor::new(
            addr("governor"),
            addr("token"),
            GovernorConfig {
                quorum: QuorumRule::Fraction { numerator: 4 },
                proposal_threshold: UNIT,
                ..config()
            },
        )
        .unwrap();
        let w = StaticWeights::default().with("whale", 1_000 * UNIT);
        assert_eq!(gov.quorum(&w, 1, 2).unwrap(), 40 * UNIT);
        assert_eq!(gov.proposal_threshold(), UNIT);
    }

    #[test]
    fn test_ragged_bundle_rejected_on_queue() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let dh = description_hash("fund");
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        gov.cast_vote(&at("alice", 7), &w, &mut log, id, 1).unwrap();
        gov.cast_vote(&at("bob", 7), &w, &mut log, id, 1).unwrap();

        // An extra trailing target hashes to the same id but is malformed
        let mut ragged = bundle();
        ragged.targets.push(addr("elsewhere"));
        assert_eq!(ragged.proposal_id(&dh), id);

        let err = gov.queue(&at("anyone", 17), &w, &mut log, &ragged, &dh).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProposal(_)));
        assert_eq!(gov.state(&w, id, 17).unwrap(), ProposalState::Succeeded);

        gov.queue(&at("anyone", 17), &w, &mut log, &bundle(), &dh).unwrap();
        let err = gov.execute(&at("anyone", 19), &w, &mut log, &ragged, &dh).unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidProposal(_)));
    }

    #[test]
    fn test_state_before_creation() {
        let mut gov = governor();
        let mut log = EventLog::new();
        let w = voters();
        let id = gov.propose(&at("alice", 5), &w, &mut log, bundle(), "fund").unwrap();
        assert!(gov.state_at(&w, id, 4).is_err());
        assert_eq!(gov.state_at(&w, id, 5).unwrap(), ProposalState::Pending);
    }
}
