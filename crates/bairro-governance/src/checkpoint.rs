//! Append-only weight history.
//!
//! One `Checkpoints` list exists per delegate plus one for the total
//! supply. Heights are strictly increasing; a second write in the same
//! block overwrites that block's entry.

use bairro_types::{Amount, BlockNumber};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Weight of an account as of the end of `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block: BlockNumber,
    pub weight: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoints(Vec<Checkpoint>);

impl Checkpoints {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Record `weight` at `block`. Returns the previous latest weight.
    pub fn push(&mut self, block: BlockNumber, weight: Amount) -> Result<Amount, LedgerError> {
        match self.0.last_mut() {
            Some(last) if last.block > block => Err(LedgerError::CheckpointOrder {
                last: last.block,
                block,
            }),
            Some(last) if last.block == block => {
                let previous = last.weight;
                last.weight = weight;
                Ok(previous)
            }
            Some(last) => {
                let previous = last.weight;
                self.0.push(Checkpoint { block, weight });
                Ok(previous)
            }
            None => {
                self.0.push(Checkpoint { block, weight });
                Ok(0)
            }
        }
    }

    /// Weight of the latest checkpoint at or before `block`, or 0.
    pub fn upper_lookup(&self, block: BlockNumber) -> Amount {
        let idx = self.0.partition_point(|cp| cp.block <= block);
        match idx {
            0 => 0,
            n => self.0[n - 1].weight,
        }
    }

    pub fn latest(&self) -> Amount {
        self.0.last().map_or(0, |cp| cp.weight)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Checkpoint> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.0.iter()
    }
}
