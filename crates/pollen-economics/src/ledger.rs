// crates/pollen-economics/src/ledger.rs
//
// In-memory PLN / vePLN ledger.
//
// Stands in for the external fungible-token contracts. Balances, supplies,
// and allowances are kept per token kind. vePLN is the escrow receipt and is
// non-transferable: it may only move between an account and protocol custody
// (that is how vePLN is delegated into portfolios and returned).

use std::collections::BTreeMap;

use pollen_core::error::PollenError;
use pollen_core::identity::{AccountId, TokenKind};
use pollen_core::traits::TokenLedger;

/// The token ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: BTreeMap<(TokenKind, AccountId), u128>,
    supplies: BTreeMap<TokenKind, u128>,
    allowances: BTreeMap<(TokenKind, AccountId, AccountId), u128>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn debit(&mut self, kind: TokenKind, account: &AccountId, amount: u128) -> Result<(), PollenError> {
        let available = self.balance_of(kind, account);
        if amount > available {
            return Err(PollenError::InsufficientBalance {
                kind,
                required: amount,
                available,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(&(kind, *account));
        } else {
            self.balances.insert((kind, *account), remaining);
        }
        Ok(())
    }

    fn credit(&mut self, kind: TokenKind, account: &AccountId, amount: u128) -> Result<(), PollenError> {
        let balance = self.balances.entry((kind, *account)).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(PollenError::ArithmeticOverflow)?;
        Ok(())
    }

    fn check_movable(kind: TokenKind, from: &AccountId, to: &AccountId) -> Result<(), PollenError> {
        if kind == TokenKind::VePollen && !from.is_system() && !to.is_system() {
            return Err(PollenError::NonTransferable);
        }
        Ok(())
    }

    /// Every non-zero balance of a kind, for inspection.
    pub fn holders(&self, kind: TokenKind) -> impl Iterator<Item = (&AccountId, &u128)> {
        self.balances
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .map(|((_, account), balance)| (account, balance))
    }
}

impl TokenLedger for Ledger {
    fn balance_of(&self, kind: TokenKind, account: &AccountId) -> u128 {
        self.balances.get(&(kind, *account)).copied().unwrap_or(0)
    }

    fn total_supply(&self, kind: TokenKind) -> u128 {
        self.supplies.get(&kind).copied().unwrap_or(0)
    }

    fn allowance(&self, kind: TokenKind, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(&(kind, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(
        &mut self,
        kind: TokenKind,
        owner: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) -> Result<(), PollenError> {
        owner.ensure_nonzero()?;
        spender.ensure_nonzero()?;
        self.allowances.insert((kind, *owner, *spender), amount);
        Ok(())
    }

    fn transfer(
        &mut self,
        kind: TokenKind,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PollenError> {
        to.ensure_nonzero()?;
        Self::check_movable(kind, from, to)?;
        self.debit(kind, from, amount)?;
        self.credit(kind, to, amount)
    }

    fn transfer_from(
        &mut self,
        kind: TokenKind,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PollenError> {
        let allowed = self.allowance(kind, from, spender);
        if amount > allowed {
            return Err(PollenError::InsufficientAllowance {
                kind,
                required: amount,
                available: allowed,
            });
        }
        self.transfer(kind, from, to, amount)?;
        if allowed != u128::MAX {
            self.allowances
                .insert((kind, *from, *spender), allowed - amount);
        }
        Ok(())
    }

    fn mint(&mut self, kind: TokenKind, to: &AccountId, amount: u128) -> Result<(), PollenError> {
        to.ensure_nonzero()?;
        let supply = self.supplies.entry(kind).or_insert(0);
        *supply = supply
            .checked_add(amount)
            .ok_or(PollenError::ArithmeticOverflow)?;
        self.credit(kind, to, amount)
    }

    fn burn(&mut self, kind: TokenKind, from: &AccountId, amount: u128) -> Result<(), PollenError> {
        self.debit(kind, from, amount)?;
        let supply = self.supplies.entry(kind).or_insert(0);
        *supply = supply.saturating_sub(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new([1u8; 32])
    }

    fn bob() -> AccountId {
        AccountId::new([2u8; 32])
    }

    #[test]
    fn test_mint_and_transfer() {
        let mut ledger = Ledger::new();
        ledger.mint(TokenKind::Pollen, &alice(), 100).unwrap();
        ledger.transfer(TokenKind::Pollen, &alice(), &bob(), 40).unwrap();

        assert_eq!(ledger.balance_of(TokenKind::Pollen, &alice()), 60);
        assert_eq!(ledger.balance_of(TokenKind::Pollen, &bob()), 40);
        assert_eq!(ledger.total_supply(TokenKind::Pollen), 100);
    }

    #[test]
    fn test_transfer_insufficient_balance_leaves_state() {
        let mut ledger = Ledger::new();
        ledger.mint(TokenKind::Pollen, &alice(), 10).unwrap();
        let result = ledger.transfer(TokenKind::Pollen, &alice(), &bob(), 11);
        assert_eq!(
            result,
            Err(PollenError::InsufficientBalance {
                kind: TokenKind::Pollen,
                required: 11,
                available: 10
            })
        );
        assert_eq!(ledger.balance_of(TokenKind::Pollen, &alice()), 10);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let mut ledger = Ledger::new();
        let spender = AccountId::PORTFOLIO_CUSTODY;
        ledger.mint(TokenKind::Pollen, &alice(), 100).unwrap();
        ledger.approve(TokenKind::Pollen, &alice(), &spender, 50).unwrap();

        ledger
            .transfer_from(TokenKind::Pollen, &spender, &alice(), &spender, 30)
            .unwrap();
        assert_eq!(ledger.allowance(TokenKind::Pollen, &alice(), &spender), 20);

        let result = ledger.transfer_from(TokenKind::Pollen, &spender, &alice(), &spender, 30);
        assert!(matches!(result, Err(PollenError::InsufficientAllowance { .. })));
    }

    #[test]
    fn test_unlimited_allowance_is_not_consumed() {
        let mut ledger = Ledger::new();
        let spender = AccountId::ESCROW_CUSTODY;
        ledger.mint(TokenKind::Pollen, &alice(), 100).unwrap();
        ledger
            .approve(TokenKind::Pollen, &alice(), &spender, u128::MAX)
            .unwrap();
        ledger
            .transfer_from(TokenKind::Pollen, &spender, &alice(), &spender, 100)
            .unwrap();
        assert_eq!(
            ledger.allowance(TokenKind::Pollen, &alice(), &spender),
            u128::MAX
        );
    }

    #[test]
    fn test_ve_pollen_is_non_transferable_between_users() {
        let mut ledger = Ledger::new();
        ledger.mint(TokenKind::VePollen, &alice(), 10).unwrap();
        assert_eq!(
            ledger.transfer(TokenKind::VePollen, &alice(), &bob(), 1),
            Err(PollenError::NonTransferable)
        );
        // ...but may be delegated into portfolio custody.
        ledger
            .transfer(TokenKind::VePollen, &alice(), &AccountId::PORTFOLIO_CUSTODY, 4)
            .unwrap();
        assert_eq!(
            ledger.balance_of(TokenKind::VePollen, &AccountId::PORTFOLIO_CUSTODY),
            4
        );
    }

    #[test]
    fn test_burn_reduces_supply() {
        let mut ledger = Ledger::new();
        ledger.mint(TokenKind::Pollen, &alice(), 10).unwrap();
        ledger.burn(TokenKind::Pollen, &alice(), 4).unwrap();
        assert_eq!(ledger.total_supply(TokenKind::Pollen), 6);
        assert!(ledger.burn(TokenKind::Pollen, &alice(), 7).is_err());
    }

    #[test]
    fn test_mint_to_zero_rejected() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.mint(TokenKind::Pollen, &AccountId::ZERO, 1),
            Err(PollenError::ZeroAddress)
        );
    }
}
