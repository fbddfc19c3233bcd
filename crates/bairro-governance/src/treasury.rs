//! Milestone escrow treasury.
//!
//! Holds the community's funds and pays the service provider in two
//! milestones: an initial payment, then a final payment once the
//! provider has confirmed completion. Fund-moving calls are accepted
//! only from the controller (the governor after bootstrap).

use std::fmt;

use bairro_types::{Address, Amount};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bank::Bank;
use crate::call::TreasuryCall;
use crate::error::TreasuryError;
use crate::events::{Event, EventLog};
use crate::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Milestone {
    Initial,
    Final,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Initial => write!(f, "Initial"),
            Milestone::Final => write!(f, "Final"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treasury {
    address: Address,
    /// Sole authority over fund-moving calls
    controller: Address,
    service_provider: Address,
    initial_released: bool,
    final_released: bool,
    service_confirmed: bool,
}

impl Treasury {
    pub fn new(address: Address, controller: Address, service_provider: Address) -> Self {
        Self {
            address,
            controller,
            service_provider,
            initial_released: false,
            final_released: false,
            service_confirmed: false,
        }
    }

    fn only_controller(&self, ctx: &Context) -> Result<(), TreasuryError> {
        if ctx.caller != self.controller {
            warn!(caller = %ctx.caller.short(), "treasury call from non-controller");
            return Err(TreasuryError::Unauthorized {
                caller: ctx.caller,
                role: "the treasury controller",
            });
        }
        Ok(())
    }

    fn check_funds(&self, bank: &Bank, amount: Amount) -> Result<(), TreasuryError> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount);
        }
        let available = bank.balance_of(&self.address);
        if available < amount {
            return Err(TreasuryError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        Ok(())
    }

    /// Pay the first milestone to the service provider.
    ///
    /// # Errors
    /// - `Unauthorized` unless called by the controller
    /// - `AlreadyReleased` on a second release
    /// - `InsufficientFunds` if the escrow holds less than `amount`
    pub fn release_initial_payment(
        &mut self,
        ctx: &Context,
        bank: &mut Bank,
        log: &mut EventLog,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        self.only_controller(ctx)?;
        if self.initial_released {
            return Err(TreasuryError::AlreadyReleased(Milestone::Initial));
        }
        self.check_funds(bank, amount)?;

        // Flag first: the payout must not be repeatable from a callback.
        self.initial_released = true;
        self.pay(ctx, bank, log, Milestone::Initial, amount)
    }

    /// Pay the final milestone. Requires the initial payment and the
    /// provider's completion attestation.
    pub fn release_final_payment(
        &mut self,
        ctx: &Context,
        bank: &mut Bank,
        log: &mut EventLog,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        self.only_controller(ctx)?;
        if !(self.initial_released && self.service_confirmed) {
            return Err(TreasuryError::PrerequisiteNotMet {
                initial_released: self.initial_released,
                service_confirmed: self.service_confirmed,
            });
        }
        if self.final_released {
            return Err(TreasuryError::AlreadyReleased(Milestone::Final));
        }
        self.check_funds(bank, amount)?;

        self.final_released = true;
        self.pay(ctx, bank, log, Milestone::Final, amount)
    }

    fn pay(
        &self,
        ctx: &Context,
        bank: &mut Bank,
        log: &mut EventLog,
        milestone: Milestone,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        bank.transfer(self.address, self.service_provider, amount)?;
        log.emit(
            ctx.block,
            self.address,
            Event::FundsReleased {
                milestone,
                to: self.service_provider,
                amount,
            },
        );
        info!(%milestone, amount, provider = %self.service_provider.short(), block = ctx.block, "released milestone payment");
        Ok(())
    }

    /// Attestation by the service provider that the work is done.
    /// Deliberately not controller-gated.
    pub fn confirm_completion(
        &mut self,
        ctx: &Context,
        log: &mut EventLog,
    ) -> Result<(), TreasuryError> {
        if ctx.caller != self.service_provider {
            return Err(TreasuryError::Unauthorized {
                caller: ctx.caller,
                role: "the service provider",
            });
        }
        if self.service_confirmed {
            return Err(TreasuryError::AlreadyConfirmed);
        }

        self.service_confirmed = true;
        log.emit(
            ctx.block,
            self.address,
            Event::CompletionConfirmed { provider: ctx.caller },
        );
        info!(block = ctx.block, "service completion confirmed");
        Ok(())
    }

    /// Hand controller authority to `new_controller`.
    pub fn transfer_ownership(
        &mut self,
        ctx: &Context,
        log: &mut EventLog,
        new_controller: Address,
    ) -> Result<(), TreasuryError> {
        self.only_controller(ctx)?;
        if new_controller.is_zero() {
            return Err(TreasuryError::InvalidController);
        }

        let previous = self.controller;
        self.controller = new_controller;
        log.emit(
            ctx.block,
            self.address,
            Event::OwnershipTransferred { previous, new: new_controller },
        );
        info!(previous = %previous.short(), new = %new_controller.short(), "treasury control transferred");
        Ok(())
    }

    /// Move `amount` of the caller's funds into escrow.
    pub fn deposit(
        &mut self,
        ctx: &Context,
        bank: &mut Bank,
        log: &mut EventLog,
        amount: Amount,
    ) -> Result<(), TreasuryError> {
        if amount == 0 {
            return Err(TreasuryError::InvalidAmount);
        }
        bank.transfer(ctx.caller, self.address, amount)?;
        log.emit(
            ctx.block,
            self.address,
            Event::Deposited { from: ctx.caller, amount },
        );
        Ok(())
    }

    /// Apply a decoded call made on behalf of `ctx.caller`.
    pub fn handle_call(
        &mut self,
        ctx: &Context,
        bank: &mut Bank,
        log: &mut EventLog,
        call: TreasuryCall,
    ) -> Result<(), TreasuryError> {
        match call {
            TreasuryCall::ReleaseInitialPayment { amount } => {
                self.release_initial_payment(ctx, bank, log, amount)
            }
            TreasuryCall::ReleaseFinalPayment { amount } => {
                self.release_final_payment(ctx, bank, log, amount)
            }
            TreasuryCall::ConfirmCompletion => self.confirm_completion(ctx, log),
            TreasuryCall::TransferOwnership { new_controller } => {
                self.transfer_ownership(ctx, log, new_controller)
            }
            TreasuryCall::Deposit { amount } => self.deposit(ctx, bank, log, amount),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn service_provider(&self) -> Address {
        self.service_provider
    }

    pub fn balance(&self, bank: &Bank) -> Amount {
        bank.balance_of(&self.address)
    }

    pub fn is_initial_payment_released(&self) -> bool {
        self.initial_released
    }

    pub fn is_final_payment_released(&self) -> bool {
        self.final_released
    }

    pub fn is_service_confirmed(&self) -> bool {
        self.service_confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    struct Fixture {
        treasury: Treasury,
        bank: Bank,
        log: EventLog,
        governor: Address,
        provider: Address,
    }

    fn fixture(funds: Amount) -> Fixture {
        let governor = Address::from_label("governor");
        let provider = Address::from_label("provider");
        let treasury = Treasury::new(Address::from_label("treasury"), governor, provider);
        let mut bank = Bank::new();
        bank.credit(treasury.address(), funds).unwrap();
        Fixture {
            treasury,
            bank,
            log: EventLog::new(),
            governor,
            provider,
        }
    }

    #[test]
    fn test_release_initial_payment() {
        let mut f = fixture(1_000);
        let ctx = Context::new(f.governor, 5);
        f.treasury
            .release_initial_payment(&ctx, &mut f.bank, &mut f.log, 400)
            .unwrap();

        assert!(f.treasury.is_initial_payment_released());
        assert_eq!(f.bank.balance_of(&f.provider), 400);
        assert_eq!(f.treasury.balance(&f.bank), 600);
        assert_eq!(f.log.named("funds_released").count(), 1);
    }

    #[test]
    fn test_release_requires_controller() {
        let mut f = fixture(1_000);
        let ctx = Context::new(Address::from_label("mallory"), 5);
        let err = f
            .treasury
            .release_initial_payment(&ctx, &mut f.bank, &mut f.log, 400)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(!f.treasury.is_initial_payment_released());
    }

    #[test]
    fn test_release_initial_twice() {
        let mut f = fixture(1_000);
        let ctx = Context::new(f.governor, 5);
        f.treasury
            .release_initial_payment(&ctx, &mut f.bank, &mut f.log, 100)
            .unwrap();
        let err = f
            .treasury
            .release_initial_payment(&ctx, &mut f.bank, &mut f.log, 100)
            .unwrap_err();
        assert_eq!(err, TreasuryError::AlreadyReleased(Milestone::Initial));
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert_eq!(f.bank.balance_of(&f.provider), 100);
    }

    #[test]
    fn test_insufficient_funds() {
        let mut f = fixture(10);
        let ctx = Context::new(f.governor, 5);
        assert_eq!(
            f.treasury.release_initial_payment(&ctx, &mut f.bank, &mut f.log, 11),
            Err(TreasuryError::InsufficientFunds { available: 10, required: 11 })
        );
        assert!(!f.treasury.is_initial_payment_released());
    }

    #[test]
    fn test_final_requires_initial_and_confirmation() {
        let mut f = fixture(1_000);
        let gov = Context::new(f.governor, 5);
        let provider = Context::new(f.provider, 5);

        // Neither prerequisite
        assert_eq!(
            f.treasury.release_final_payment(&gov, &mut f.bank, &mut f.log, 100),
            Err(TreasuryError::PrerequisiteNotMet {
                initial_released: false,
                service_confirmed: false
            })
        );

        // Confirmation alone is not enough
        f.treasury.confirm_completion(&provider, &mut f.log).unwrap();
        assert!(matches!(
            f.treasury.release_final_payment(&gov, &mut f.bank, &mut f.log, 100),
            Err(TreasuryError::PrerequisiteNotMet { initial_released: false, .. })
        ));

        f.treasury
            .release_initial_payment(&gov, &mut f.bank, &mut f.log, 100)
            .unwrap();
        f.treasury
            .release_final_payment(&gov, &mut f.bank, &mut f.log, 900)
            .unwrap();
        assert!(f.treasury.is_final_payment_released());
        assert_eq!(f.treasury.balance(&f.bank), 0);

        assert_eq!(
            f.treasury.release_final_payment(&gov, &mut f.bank, &mut f.log, 1),
            Err(TreasuryError::AlreadyReleased(Milestone::Final))
        );
    }

    #[test]
    fn test_initial_alone_does_not_unlock_final() {
        let mut f = fixture(1_000);
        let gov = Context::new(f.governor, 5);
        f.treasury
            .release_initial_payment(&gov, &mut f.bank, &mut f.log, 100)
            .unwrap();
        assert!(matches!(
            f.treasury.release_final_payment(&gov, &mut f.bank, &mut f.log, 100),
            Err(TreasuryError::PrerequisiteNotMet { service_confirmed: false, .. })
        ));
    }

    #[test]
    fn test_confirm_completion_only_provider_once() {
        let mut f = fixture(0);
        let gov = Context::new(f.governor, 5);
        assert!(matches!(
            f.treasury.confirm_completion(&gov, &mut f.log),
            Err(TreasuryError::Unauthorized { .. })
        ));

        let provider = Context::new(f.provider, 5);
        f.treasury.confirm_completion(&provider, &mut f.log).unwrap();
        assert_eq!(
            f.treasury.confirm_completion(&provider, &mut f.log),
            Err(TreasuryError::AlreadyConfirmed)
        );
    }

    #[test]
    fn test_transfer_ownership_revokes_previous_controller() {
        let mut f = fixture(1_000);
        let deployer = Address::from_label("deployer");
        let mut treasury = Treasury::new(f.treasury.address(), deployer, f.provider);

        let ctx = Context::new(deployer, 1);
        treasury.transfer_ownership(&ctx, &mut f.log, f.governor).unwrap();
        assert_eq!(treasury.controller(), f.governor);

        assert!(matches!(
            treasury.release_initial_payment(&ctx, &mut f.bank, &mut f.log, 1),
            Err(TreasuryError::Unauthorized { .. })
        ));
        assert!(treasury.transfer_ownership(&ctx, &mut f.log, deployer).is_err());
    }

    #[test]
    fn test_transfer_ownership_rejects_zero() {
        let mut f = fixture(0);
        let ctx = Context::new(f.governor, 1);
        assert_eq!(
            f.treasury.transfer_ownership(&ctx, &mut f.log, Address::ZERO),
            Err(TreasuryError::InvalidController)
        );
    }

    #[test]
    fn test_handle_call_dispatches() {
        let mut f = fixture(500);
        let ctx = Context::new(f.governor, 2);
        let call = TreasuryCall::decode(&TreasuryCall::ReleaseInitialPayment { amount: 50 }.encode())
            .unwrap();
        f.treasury.handle_call(&ctx, &mut f.bank, &mut f.log, call).unwrap();
        assert!(f.treasury.is_initial_payment_released());
    }
}
