//! Calldata codec and proposal call bundles.
//!
//! Calldata is the borsh encoding of the target component's call enum.
//! A proposal's id is derived from its bundle and description hash, so
//! `queue` and `execute` can re-derive it from the same inputs.

use bairro_types::{Address, Amount, Hash};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::error::{CallError, GovernanceError};
use crate::proposal::ProposalId;

const PROPOSAL_DOMAIN: &[u8] = b"bairro.proposal.v1";

/// Operations the treasury exposes to callers.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum TreasuryCall {
    ReleaseInitialPayment { amount: Amount },
    ReleaseFinalPayment { amount: Amount },
    ConfirmCompletion,
    TransferOwnership { new_controller: Address },
    Deposit { amount: Amount },
}

/// Operations the vote ledger exposes to callers.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum TokenCall {
    Mint { to: Address, amount: Amount },
    Transfer { to: Address, amount: Amount },
    Delegate { to: Address },
}

/// Operations the governor exposes to callers. Only reachable from an
/// executing bundle, where the reentrancy guard rejects them.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum GovernorCall {
    Queue { bundle: CallBundle, description_hash: Hash },
    Execute { bundle: CallBundle, description_hash: Hash },
    Cancel { id: Hash },
}

macro_rules! impl_calldata {
    ($($ty:ty),*) => {$(
        impl $ty {
            pub fn encode(&self) -> Vec<u8> {
                borsh::to_vec(self).unwrap_or_default()
            }

            pub fn decode(data: &[u8]) -> Result<Self, CallError> {
                borsh::from_slice(data).map_err(|e| CallError::Malformed(e.to_string()))
            }
        }
    )*};
}

impl_calldata!(TreasuryCall, TokenCall, GovernorCall);

/// One call of a bundle, as dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalCall<'a> {
    pub target: Address,
    pub value: Amount,
    pub calldata: &'a [u8],
}

/// Ordered (target, value, calldata) triples a proposal will execute.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct CallBundle {
    pub targets: Vec<Address>,
    pub values: Vec<Amount>,
    pub calldatas: Vec<Vec<u8>>,
}

impl CallBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call.
    pub fn push(mut self, target: Address, value: Amount, calldata: Vec<u8>) -> Self {
        self.targets.push(target);
        self.values.push(value);
        self.calldatas.push(calldata);
        self
    }

    /// Bundle a single zero-value call.
    pub fn single(target: Address, calldata: Vec<u8>) -> Self {
        Self::new().push(target, 0, calldata)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.targets.is_empty() {
            return Err(GovernanceError::InvalidProposal("empty proposal".to_string()));
        }
        if self.values.len() != self.targets.len() || self.calldatas.len() != self.targets.len()
        {
            return Err(GovernanceError::InvalidProposal(format!(
                "length mismatch: {} targets, {} values, {} calldatas",
                self.targets.len(),
                self.values.len(),
                self.calldatas.len()
            )));
        }
        Ok(())
    }

    pub fn calls(&self) -> impl Iterator<Item = ProposalCall<'_>> {
        self.targets
            .iter()
            .zip(&self.values)
            .zip(&self.calldatas)
            .map(|((target, value), calldata)| ProposalCall {
                target: *target,
                value: *value,
                calldata,
            })
    }

    /// Deterministic id of a proposal executing this bundle.
    ///
    /// `blake3(domain || (target || value_le || blake3(calldata))* || description_hash)`
    pub fn proposal_id(&self, description_hash: &Hash) -> ProposalId {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(self.len() * 3 + 2);
        parts.push(PROPOSAL_DOMAIN.to_vec());
        for call in self.calls() {
            parts.push(call.target.as_bytes().to_vec());
            parts.push(call.value.to_le_bytes().to_vec());
            parts.push(Hash::compute(call.calldata).as_bytes().to_vec());
        }
        parts.push(description_hash.as_bytes().to_vec());

        let slices: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        Hash::compute_multi(&slices)
    }
}

/// Hash a human-readable proposal description.
pub fn description_hash(description: &str) -> Hash {
    Hash::compute(description.as_bytes())
}
