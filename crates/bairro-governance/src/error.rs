use bairro_types::{Address, Amount, BlockNumber};
use thiserror::Error;

use crate::proposal::{ProposalId, ProposalState};
use crate::treasury::Milestone;

/// Failure class reported to off-chain tooling alongside the error itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong caller
    Authorization,
    /// Operation invalid for the current lifecycle state
    State,
    /// Insufficient weight, funds or quorum
    Threshold,
    /// Double vote, double proposal, double release
    Duplicate,
    /// Milestone prerequisite unmet or timelock still running
    Ordering,
    /// Proposal id / hash mismatch
    Integrity,
    /// Malformed input (bad amount, bad support value, bad calldata)
    Input,
}

/// Errors raised by the vote ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Unauthorized: {caller} may not mint")]
    Unauthorized { caller: Address },

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Insufficient balance for {account}: {available} < {required}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        required: Amount,
    },

    #[error("Block {requested} is not finalized yet (current block {current})")]
    FutureBlock {
        requested: BlockNumber,
        current: BlockNumber,
    },

    #[error("Checkpoint at block {block} precedes last checkpoint at block {last}")]
    CheckpointOrder { last: BlockNumber, block: BlockNumber },

    #[error("Arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized { .. } => ErrorKind::Authorization,
            LedgerError::InvalidAmount | LedgerError::Overflow => ErrorKind::Input,
            LedgerError::InsufficientBalance { .. } => ErrorKind::Threshold,
            LedgerError::FutureBlock { .. } | LedgerError::CheckpointOrder { .. } => {
                ErrorKind::Ordering
            }
        }
    }
}

/// Errors raised by the native funds ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BankError {
    #[error("Insufficient funds for {account}: {available} < {required}")]
    InsufficientFunds {
        account: Address,
        available: Amount,
        required: Amount,
    },

    #[error("Balance overflow")]
    Overflow,
}

impl BankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::InsufficientFunds { .. } => ErrorKind::Threshold,
            BankError::Overflow => ErrorKind::Input,
        }
    }
}

/// Errors raised by the treasury.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreasuryError {
    #[error("Unauthorized: {caller} is not {role}")]
    Unauthorized { caller: Address, role: &'static str },

    #[error("{0} payment already released")]
    AlreadyReleased(Milestone),

    #[error("Service completion already confirmed")]
    AlreadyConfirmed,

    #[error("Final payment prerequisites not met (initial released: {initial_released}, service confirmed: {service_confirmed})")]
    PrerequisiteNotMet {
        initial_released: bool,
        service_confirmed: bool,
    },

    #[error("Insufficient treasury funds: {available} < {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid controller: zero address")]
    InvalidController,

    #[error(transparent)]
    Bank(#[from] BankError),
}

impl TreasuryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TreasuryError::Unauthorized { .. } => ErrorKind::Authorization,
            TreasuryError::AlreadyReleased(_) | TreasuryError::AlreadyConfirmed => {
                ErrorKind::Duplicate
            }
            TreasuryError::PrerequisiteNotMet { .. } => ErrorKind::Ordering,
            TreasuryError::InsufficientFunds { .. } | TreasuryError::Bank(_) => {
                ErrorKind::Threshold
            }
            TreasuryError::InvalidAmount | TreasuryError::InvalidController => ErrorKind::Input,
        }
    }
}

/// Errors raised by a component call, either dispatched from an executed
/// bundle or made while deploying.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CallError {
    #[error("Malformed calldata: {0}")]
    Malformed(String),

    #[error("No component at {0} accepts calldata")]
    NoComponent(Address),

    #[error("Reentrant call into {0}")]
    Reentrant(Address),

    #[error("Call depth exceeded: {depth}")]
    CallDepthExceeded { depth: usize },

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Treasury(#[from] TreasuryError),

    #[error(transparent)]
    Governance(Box<GovernanceError>),
}

impl CallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CallError::Malformed(_) | CallError::NoComponent(_) => ErrorKind::Input,
            CallError::Reentrant(_) | CallError::CallDepthExceeded { .. } => ErrorKind::State,
            CallError::Bank(e) => e.kind(),
            CallError::Ledger(e) => e.kind(),
            CallError::Treasury(e) => e.kind(),
            CallError::Governance(e) => e.kind(),
        }
    }
}

impl From<GovernanceError> for CallError {
    fn from(e: GovernanceError) -> Self {
        CallError::Governance(Box::new(e))
    }
}

/// Errors that can occur in governance operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Proposal not found: {0}")]
    UnknownProposal(ProposalId),

    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("Proposer weight below threshold: {weight} < {threshold}")]
    BelowThreshold { weight: Amount, threshold: Amount },

    #[error("Proposal already exists: {0}")]
    DuplicateProposal(ProposalId),

    #[error("Proposal is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: ProposalState,
        actual: ProposalState,
    },

    #[error("Invalid vote support value: {0}")]
    InvalidSupport(u8),

    #[error("{voter} already voted")]
    AlreadyVoted { voter: Address },

    #[error("{voter} has no voting weight at the snapshot block")]
    ZeroWeight { voter: Address },

    #[error("No succeeded proposal matches id {0}")]
    IdMismatch(ProposalId),

    #[error("Timelock not elapsed: executable at block {eta}, current block {current}")]
    TimelockNotElapsed { eta: BlockNumber, current: BlockNumber },

    #[error("Proposal already executed")]
    AlreadyExecuted,

    /// A bundle call failed; `kind` is the failing call's own class.
    #[error("Call {index} reverted: {reason}")]
    CallReverted {
        index: usize,
        kind: ErrorKind,
        reason: String,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::Unauthorized(_) => ErrorKind::Authorization,
            GovernanceError::UnknownProposal(_) | GovernanceError::InvalidState { .. } => {
                ErrorKind::State
            }
            GovernanceError::BelowThreshold { .. } | GovernanceError::ZeroWeight { .. } => {
                ErrorKind::Threshold
            }
            GovernanceError::DuplicateProposal(_)
            | GovernanceError::AlreadyVoted { .. }
            | GovernanceError::AlreadyExecuted => ErrorKind::Duplicate,
            GovernanceError::TimelockNotElapsed { .. } => ErrorKind::Ordering,
            GovernanceError::IdMismatch(_) => ErrorKind::Integrity,
            GovernanceError::InvalidProposal(_)
            | GovernanceError::InvalidSupport(_)
            | GovernanceError::InvalidConfig(_) => ErrorKind::Input,
            GovernanceError::CallReverted { kind, .. } => *kind,
            GovernanceError::Ledger(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bairro_types::Hash;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::BelowThreshold { weight: 5, threshold: 10 };
        assert!(err.to_string().contains("5 < 10"));
    }

    #[test]
    fn test_taxonomy() {
        assert_eq!(
            GovernanceError::AlreadyExecuted.kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            GovernanceError::IdMismatch(Hash::ZERO).kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            TreasuryError::PrerequisiteNotMet {
                initial_released: true,
                service_confirmed: false
            }
            .kind(),
            ErrorKind::Ordering
        );
        assert_eq!(
            TreasuryError::Unauthorized {
                caller: Address::ZERO,
                role: "the controller"
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            GovernanceError::from(LedgerError::FutureBlock { requested: 5, current: 5 }).kind(),
            ErrorKind::Ordering
        );
    }

    #[test]
    fn test_call_error_wraps_treasury() {
        let err = CallError::from(TreasuryError::AlreadyReleased(Milestone::Initial));
        assert!(err.to_string().contains("Initial payment already released"));
    }
}
