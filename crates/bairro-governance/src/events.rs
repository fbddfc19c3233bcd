//! Structured audit log.
//!
//! Every state-changing operation appends an [`EventRecord`]. The log is
//! part of the persisted chain state and is rolled back together with
//! the transaction that produced it.

use bairro_types::{Address, Amount, BlockNumber};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::proposal::{ProposalId, VoteSupport};
use crate::treasury::Milestone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Token movement; `from` is `None` for mints.
    Transfer {
        from: Option<Address>,
        to: Address,
        amount: Amount,
    },
    DelegateChanged {
        delegator: Address,
        from_delegate: Option<Address>,
        to_delegate: Address,
    },
    DelegateVotesChanged {
        delegate: Address,
        previous: Amount,
        current: Amount,
    },
    Deposited {
        from: Address,
        amount: Amount,
    },
    FundsReleased {
        milestone: Milestone,
        to: Address,
        amount: Amount,
    },
    CompletionConfirmed {
        provider: Address,
    },
    OwnershipTransferred {
        previous: Address,
        new: Address,
    },
    ProposalCreated {
        id: ProposalId,
        proposer: Address,
        targets: Vec<Address>,
        values: Vec<Amount>,
        description: String,
        snapshot: BlockNumber,
        deadline: BlockNumber,
    },
    VoteCast {
        id: ProposalId,
        voter: Address,
        support: VoteSupport,
        weight: Amount,
        reason: Option<String>,
    },
    ProposalQueued {
        id: ProposalId,
        eta: BlockNumber,
    },
    ProposalExecuted {
        id: ProposalId,
    },
    ProposalCanceled {
        id: ProposalId,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Transfer { .. } => "transfer",
            Event::DelegateChanged { .. } => "delegate_changed",
            Event::DelegateVotesChanged { .. } => "delegate_votes_changed",
            Event::Deposited { .. } => "deposited",
            Event::FundsReleased { .. } => "funds_released",
            Event::CompletionConfirmed { .. } => "completion_confirmed",
            Event::OwnershipTransferred { .. } => "ownership_transferred",
            Event::ProposalCreated { .. } => "proposal_created",
            Event::VoteCast { .. } => "vote_cast",
            Event::ProposalQueued { .. } => "proposal_queued",
            Event::ProposalExecuted { .. } => "proposal_executed",
            Event::ProposalCanceled { .. } => "proposal_canceled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub block: BlockNumber,
    /// Component that emitted the event
    pub emitter: Address,
    pub event: Event,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog(Vec<EventRecord>);

impl EventLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn emit(&mut self, block: BlockNumber, emitter: Address, event: Event) {
        debug!(block, emitter = %emitter.short(), event = event.name(), "event");
        self.0.push(EventRecord { block, emitter, event });
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.0.last()
    }

    /// Drop every event recorded after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Events emitted by one component.
    pub fn by_emitter(&self, emitter: Address) -> impl Iterator<Item = &EventRecord> {
        self.0.iter().filter(move |r| r.emitter == emitter)
    }

    /// Events recorded at or after `block`.
    pub fn since(&self, block: BlockNumber) -> impl Iterator<Item = &EventRecord> {
        let start = self.0.partition_point(|r| r.block < block);
        self.0[start..].iter()
    }

    /// Events with a given name ("vote_cast", "funds_released", ...).
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a EventRecord> + 'a {
        self.0.iter().filter(move |r| r.event.name() == name)
    }
}
