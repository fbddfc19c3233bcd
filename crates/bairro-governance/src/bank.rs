//! Native funds ledger.
//!
//! Holds the funding-token balance of every address, including the
//! treasury's escrow. Only the sequencer and the components it hands a
//! `&mut Bank` to can move funds.

use std::collections::BTreeMap;

use bairro_types::{Address, Amount};
use serde::{Deserialize, Serialize};

use crate::error::BankError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bank {
    balances: BTreeMap<Address, Amount>,
}

impl Bank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Create funds out of nothing. Bootstrap only.
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<(), BankError> {
        let balance = self
            .balance_of(&account)
            .checked_add(amount)
            .ok_or(BankError::Overflow)?;
        self.balances.insert(account, balance);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), BankError> {
        let available = self.balance_of(&from);
        if available < amount {
            return Err(BankError::InsufficientFunds {
                account: from,
                available,
                required: amount,
            });
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let credited = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(BankError::Overflow)?;
        self.balances.insert(from, available - amount);
        self.balances.insert(to, credited);
        Ok(())
    }

    pub fn total(&self) -> Amount {
        self.balances.values().sum()
    }
}
