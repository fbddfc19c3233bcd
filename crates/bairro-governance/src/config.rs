//! Governance parameters.
//!
//! Loaded from the `[governor]` section of the node's TOML file. Token
//! amounts are written as decimal strings of whole tokens ("1", "0.5")
//! because TOML integers stop at 64 bits.

use bairro_types::{Amount, BlockNumber, UNIT};
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

/// Denominator of `QuorumRule::Fraction`.
pub const QUORUM_DENOMINATOR: u64 = 100;

/// Minimum For + Abstain weight for a proposal to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuorumRule {
    /// `numerator / 100` of the total supply at the snapshot block
    Fraction { numerator: u64 },
    /// Fixed weight regardless of supply
    Fixed {
        #[serde(with = "token_amount")]
        amount: Amount,
    },
}

impl QuorumRule {
    pub fn quorum(&self, total_supply_at_snapshot: Amount) -> Amount {
        match *self {
            QuorumRule::Fraction { numerator } => {
                // Split to avoid overflowing on very large supplies.
                let denominator = Amount::from(QUORUM_DENOMINATOR);
                let numerator = Amount::from(numerator);
                (total_supply_at_snapshot / denominator)
                    .saturating_mul(numerator)
                    .saturating_add((total_supply_at_snapshot % denominator) * numerator / denominator)
            }
            QuorumRule::Fixed { amount } => amount,
        }
    }
}

/// What happens when a voter with no weight at the snapshot votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroWeightPolicy {
    /// Record the receipt (blocking a later re-vote) and count nothing
    #[default]
    RecordReceipt,
    /// Fail with `ZeroWeight` and record nothing
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    /// Blocks between proposal submission and the snapshot block
    pub voting_delay: BlockNumber,
    /// Blocks the vote stays open after the snapshot
    pub voting_period: BlockNumber,
    /// Weight the proposer needs at the previous block
    #[serde(with = "token_amount")]
    pub proposal_threshold: Amount,
    pub quorum: QuorumRule,
    /// Blocks between queueing and earliest execution
    pub timelock_delay: BlockNumber,
    /// Blocks a succeeded or queued proposal stays executable
    pub grace_period: BlockNumber,
    pub zero_weight_votes: ZeroWeightPolicy,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            voting_delay: 1,
            voting_period: 199_152, // ~1 month at 13s blocks
            proposal_threshold: UNIT,
            quorum: QuorumRule::Fraction { numerator: 4 },
            timelock_delay: 0,
            grace_period: 93_046, // ~14 days
            zero_weight_votes: ZeroWeightPolicy::RecordReceipt,
        }
    }
}

impl GovernorConfig {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidConfig(
                "voting_period must be at least one block".to_string(),
            ));
        }
        if let QuorumRule::Fraction { numerator } = self.quorum {
            if numerator > QUORUM_DENOMINATOR {
                return Err(GovernanceError::InvalidConfig(format!(
                    "quorum numerator {numerator} exceeds {QUORUM_DENOMINATOR}"
                )));
            }
        }
        Ok(())
    }
}

/// Serde adapter: `Amount` as a decimal string of whole tokens.
pub mod token_amount {
    use bairro_types::{format_units, parse_units, Amount};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_units(*amount))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_units(&s).map_err(serde::de::Error::custom)
    }
}
