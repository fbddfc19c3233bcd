//! Bairro Governance - token-weighted control of a milestone escrow.
//!
//! This crate provides:
//! - A vote ledger with delegation and per-block weight checkpoints
//! - A treasury that releases funds in milestone order
//! - The proposal lifecycle (propose / vote / queue / execute)
//! - A deterministic sequencer that applies one transaction at a time
//!   and rolls back failed ones

pub mod bank;
pub mod call;
pub mod chain;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod governor;
pub mod proposal;
pub mod reentrancy;
pub mod treasury;
pub mod vote_ledger;

pub use bank::Bank;
pub use call::{CallBundle, GovernorCall, TokenCall, TreasuryCall};
pub use chain::{Allocation, Chain, Deployment};
pub use checkpoint::{Checkpoint, Checkpoints};
pub use config::{GovernorConfig, QuorumRule, ZeroWeightPolicy};
pub use error::{
    BankError, CallError, ErrorKind, GovernanceError, LedgerError, TreasuryError,
};
pub use events::{Event, EventLog, EventRecord};
pub use governor::{Governor, VotingWeights};
pub use proposal::{Proposal, ProposalId, ProposalState, Tally, VoteReceipt, VoteSupport};
pub use treasury::{Milestone, Treasury};
pub use vote_ledger::VoteLedger;

use bairro_types::{Address, BlockNumber};

/// Who is calling and at which height. Every state-changing operation
/// receives one; nothing in the core reads a clock of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub caller: Address,
    pub block: BlockNumber,
}

impl Context {
    pub fn new(caller: Address, block: BlockNumber) -> Self {
        Self { caller, block }
    }

    /// Same height, different caller (used when a component calls another).
    pub fn with_caller(self, caller: Address) -> Self {
        Self { caller, ..self }
    }
}
