//! Proposal records and the lifecycle state function.
//!
//! Pending -> Active -> Succeeded/Defeated -> Queued -> Executed, with
//! Canceled (from Pending) and Expired (unexecuted past the grace window)
//! as the other terminal states. State is never stored: it is computed
//! from the record and a block height.

use std::collections::BTreeMap;
use std::fmt;

use bairro_types::{Address, Amount, BlockNumber, Hash};
use serde::{Deserialize, Serialize};

use crate::call::CallBundle;
use crate::error::GovernanceError;

/// Deterministic proposal identity (see [`CallBundle::proposal_id`]).
pub type ProposalId = Hash;

/// Proposal status in its lifecycle. Discriminants follow the numbering
/// off-chain tooling already uses (Defeated = 3, Succeeded = 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

impl ProposalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Canceled
                | ProposalState::Defeated
                | ProposalState::Expired
                | ProposalState::Executed
        )
    }
}

impl fmt::Display for ProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Ballot choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteSupport {
    Against = 0,
    For = 1,
    /// Counts toward quorum but not toward the majority
    Abstain = 2,
}

impl TryFrom<u8> for VoteSupport {
    type Error = GovernanceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VoteSupport::Against),
            1 => Ok(VoteSupport::For),
            2 => Ok(VoteSupport::Abstain),
            other => Err(GovernanceError::InvalidSupport(other)),
        }
    }
}

/// Write-once record of a voter's ballot on one proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub support: VoteSupport,
    pub weight: Amount,
    pub block: BlockNumber,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub abstain_votes: Amount,
}

impl Tally {
    pub fn add(&mut self, support: VoteSupport, weight: Amount) {
        let bucket = match support {
            VoteSupport::For => &mut self.for_votes,
            VoteSupport::Against => &mut self.against_votes,
            VoteSupport::Abstain => &mut self.abstain_votes,
        };
        *bucket = bucket.saturating_add(weight);
    }

    pub fn quorum_reached(&self, quorum: Amount) -> bool {
        self.for_votes.saturating_add(self.abstain_votes) >= quorum
    }

    pub fn vote_succeeded(&self) -> bool {
        self.for_votes > self.against_votes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Address,
    pub bundle: CallBundle,
    pub description: String,
    pub description_hash: Hash,
    pub created_at: BlockNumber,
    /// Weights are read at the end of this block; voting opens after it
    pub snapshot: BlockNumber,
    /// Last block of the voting window
    pub deadline: BlockNumber,
    pub tally: Tally,
    pub receipts: BTreeMap<Address, VoteReceipt>,
    pub eta: Option<BlockNumber>,
    pub queued_at: Option<BlockNumber>,
    pub executed_at: Option<BlockNumber>,
    pub canceled_at: Option<BlockNumber>,
}

fn reached(mark: Option<BlockNumber>, height: BlockNumber) -> bool {
    mark.is_some_and(|at| at <= height)
}

impl Proposal {
    /// Lifecycle state at `height`, given the quorum at the snapshot block.
    ///
    /// Pure: the same record, height and quorum always give the same state.
    /// Heights before creation are reported as `Pending`; the governor
    /// rejects them before calling this.
    pub fn state_at(&self, height: BlockNumber, quorum: Amount, grace_period: BlockNumber) -> ProposalState {
        if reached(self.canceled_at, height) {
            return ProposalState::Canceled;
        }
        if reached(self.executed_at, height) {
            return ProposalState::Executed;
        }
        if height <= self.snapshot {
            return ProposalState::Pending;
        }
        if height <= self.deadline {
            return ProposalState::Active;
        }
        if !(self.tally.vote_succeeded() && self.tally.quorum_reached(quorum)) {
            return ProposalState::Defeated;
        }

        match self.eta {
            Some(eta) if reached(self.queued_at, height) => {
                if height > eta.saturating_add(grace_period) {
                    ProposalState::Expired
                } else {
                    ProposalState::Queued
                }
            }
            _ if height > self.deadline.saturating_add(grace_period) => ProposalState::Expired,
            _ => ProposalState::Succeeded,
        }
    }

    pub fn has_voted(&self, voter: &Address) -> bool {
        self.receipts.contains_key(voter)
    }

    pub fn total_votes(&self) -> Amount {
        self.tally
            .for_votes
            .saturating_add(self.tally.against_votes)
            .saturating_add(self.tally.abstain_votes)
    }
}
