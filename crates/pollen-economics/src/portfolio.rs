// crates/pollen-economics/src/portfolio.rs
//
// Portfolio accounting: target allocations, deposits, share balances, and the
// benchmark reference each portfolio is measured against.
//
// A portfolio is a unit-value index. Its holdings describe one unit of value,
// starting at 1.0, and a depositor's balance is a share count bought at the
// index value of the moment they deposit:
//   shares = amount * SCALE / value_now
// Deposits and shares are tracked per token kind so settlement can return
// principal in the kind it came in.
//
// Each deposit also buys benchmark units at the benchmark value of the moment:
//   benchmark_units = amount * SCALE / benchmark_now
// so a position's benchmark return is measured from its own entry, exactly as
// its portfolio return is. A late depositor therefore neither gains nor loses
// from benchmark movement that happened before they entered.
//
// `benchmark_ref` is the portfolio-wide entry reference reported in events.
// Every deposit rebases it to the deposit-weighted average of the prior
// reference and the current benchmark value, weighted by prior total deposit
// and the new amount.

use std::collections::BTreeMap;

use serde::Serialize;

use pollen_core::config::{AssetConfig, ProtocolConfig};
use pollen_core::error::PollenError;
use pollen_core::events::ProtocolEvent;
use pollen_core::identity::{AccountId, CallContext, TokenKind, CASH_ASSET};
use pollen_core::math::{checked_add, checked_sub, mul_div, SCALE};
use pollen_core::traits::TokenLedger;

use crate::oracle::PriceSnapshot;
use crate::token::KindAmounts;
use crate::valuation::{validate_allocation, Holdings, WEIGHT_TOTAL};

/// Market inputs for one call: the whitelist, a price snapshot, and the
/// benchmark value at those prices.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub assets: &'a [AssetConfig],
    pub prices: &'a PriceSnapshot,
    pub benchmark_value: u128,
}

/// Deposit limits, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortfolioLimits {
    pub min_deposit: u128,
    pub max_balance: u128,
    pub max_operations: usize,
}

impl PortfolioLimits {
    pub fn from_config(config: &ProtocolConfig) -> Result<Self, PollenError> {
        Ok(Self {
            min_deposit: config.min_portfolio_deposit_units()?,
            max_balance: config.max_portfolio_balance_units()?,
            max_operations: config.max_delegation_operations,
        })
    }

    /// Reject a batch that is unbalanced or too large.
    pub fn check_batch(&self, owners: usize, amounts: usize) -> Result<(), PollenError> {
        if owners != amounts {
            return Err(PollenError::LengthMismatch {
                expected: owners,
                actual: amounts,
            });
        }
        if owners > self.max_operations {
            return Err(PollenError::ExceedsMaxOperations {
                requested: owners,
                maximum: self.max_operations,
            });
        }
        Ok(())
    }
}

/// One depositor's stake in a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    /// Principal deposited, per kind.
    pub deposit: KindAmounts,
    /// Shares held, per kind.
    pub balance: KindAmounts,
    /// Benchmark units bought alongside the shares, per kind.
    pub benchmark_units: KindAmounts,
}

/// A user portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Portfolio {
    pub owner: AccountId,
    pub weights: Vec<u8>,
    pub holdings: Holdings,
    /// Principal deposited by everyone, both kinds.
    pub total_deposited: u128,
    /// Shares outstanding, both kinds.
    pub total_balance: u128,
    /// Benchmark value this portfolio's deposits are measured from.
    pub benchmark_ref: u128,
    pub is_open: bool,
    positions: BTreeMap<AccountId, Position>,
}

impl Portfolio {
    pub fn position(&self, account: &AccountId) -> Option<&Position> {
        self.positions.get(account)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.positions.iter()
    }

    /// Current index value at `prices`.
    pub fn value(&self, prices: &PriceSnapshot) -> Result<u128, PollenError> {
        self.holdings.value(prices)
    }

    fn ensure_room(&self, amount: u128, limits: &PortfolioLimits) -> Result<(), PollenError> {
        let balance = checked_add(self.total_deposited, amount)?;
        if balance > limits.max_balance {
            return Err(PollenError::ExceedsMaxPortfolioBalance {
                balance,
                maximum: limits.max_balance,
            });
        }
        Ok(())
    }

    /// Buy shares at `value_now` and benchmark units at `benchmark_value` for
    /// `account`, and rebase the reference.
    fn credit(
        &mut self,
        account: &AccountId,
        kind: TokenKind,
        amount: u128,
        value_now: u128,
        benchmark_value: u128,
    ) -> Result<(), PollenError> {
        if value_now == 0 || benchmark_value == 0 {
            return Err(PollenError::ZeroPortfolioValue);
        }
        let shares = mul_div(amount, SCALE, value_now)?;
        let units = mul_div(amount, SCALE, benchmark_value)?;
        self.benchmark_ref =
            rebase_benchmark_ref(self.benchmark_ref, self.total_deposited, benchmark_value, amount)?;
        self.total_deposited = checked_add(self.total_deposited, amount)?;
        self.total_balance = checked_add(self.total_balance, shares)?;

        let position = self.positions.entry(*account).or_default();
        let deposit = position.deposit.get_mut(kind);
        *deposit = checked_add(*deposit, amount)?;
        let balance = position.balance.get_mut(kind);
        *balance = checked_add(*balance, shares)?;
        let benchmark_units = position.benchmark_units.get_mut(kind);
        *benchmark_units = checked_add(*benchmark_units, units)?;
        Ok(())
    }
}

/// Deposit-weighted rebase of a benchmark reference.
///
/// `(reference * prior + benchmark * added) / (prior + added)`, computed as a
/// signed step from `reference` so the products stay in range. With no prior
/// deposit the new reference is the current benchmark value.
pub fn rebase_benchmark_ref(
    reference: u128,
    prior_deposit: u128,
    benchmark_value: u128,
    added: u128,
) -> Result<u128, PollenError> {
    if prior_deposit == 0 {
        return Ok(benchmark_value);
    }
    if added == 0 {
        return Ok(reference);
    }
    let weight = checked_add(prior_deposit, added)?;
    if benchmark_value >= reference {
        let step = mul_div(benchmark_value - reference, added, weight)?;
        checked_add(reference, step)
    } else {
        let step = mul_div(reference - benchmark_value, added, weight)?;
        checked_sub(reference, step)
    }
}

/// Every portfolio, keyed by owner.
#[derive(Debug, Clone, Default)]
pub struct PortfolioBook {
    portfolios: BTreeMap<AccountId, Portfolio>,
    /// DAO-wide principal currently delegated into portfolios.
    total_delegated: u128,
}

impl PortfolioBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner: &AccountId) -> Option<&Portfolio> {
        self.portfolios.get(owner)
    }

    pub fn portfolios(&self) -> impl Iterator<Item = &Portfolio> {
        self.portfolios.values()
    }

    pub fn total_delegated(&self) -> u128 {
        self.total_delegated
    }

    /// Current index value of `owner`'s portfolio.
    pub fn current_value(&self, owner: &AccountId, prices: &PriceSnapshot) -> Result<u128, PollenError> {
        self.get(owner).ok_or(PollenError::PortfolioNotFound)?.value(prices)
    }

    /// Open the caller's portfolio with an initial deposit.
    ///
    /// The portfolio starts at value 1.0 and its reference at the current
    /// benchmark value. An all-cash allocation creates it closed.
    ///
    /// # Errors
    /// `PortfolioAlreadyInitialized`, any allocation error, and
    /// `BelowMinimumDeposit` / `ExceedsMaxPortfolioBalance` for the amount.
    #[allow(clippy::too_many_arguments)]
    pub fn create_portfolio<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
        weights: Vec<u8>,
        is_short: Vec<bool>,
        amount: u128,
        kind: TokenKind,
        market: &MarketView<'_>,
        limits: &PortfolioLimits,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        ctx.caller.ensure_nonzero()?;
        if self.portfolios.contains_key(&ctx.caller) {
            return Err(PollenError::PortfolioAlreadyInitialized);
        }
        validate_allocation(&weights, &is_short, market.assets)?;
        if amount == 0 {
            return Err(PollenError::InvalidAmount("deposit must be positive".to_string()));
        }
        if amount < limits.min_deposit {
            return Err(PollenError::BelowMinimumDeposit {
                amount,
                minimum: limits.min_deposit,
            });
        }

        let holdings = Holdings::derive(&weights, &is_short, SCALE, market.prices)?;
        let mut portfolio = Portfolio {
            owner: ctx.caller,
            is_open: weights[CASH_ASSET] as u32 != WEIGHT_TOTAL,
            weights: weights.clone(),
            holdings,
            total_deposited: 0,
            total_balance: 0,
            benchmark_ref: market.benchmark_value,
            positions: BTreeMap::new(),
        };
        portfolio.ensure_room(amount, limits)?;
        portfolio.credit(&ctx.caller, kind, amount, SCALE, market.benchmark_value)?;

        let mut events = vec![ProtocolEvent::PortfolioCreated {
            owner: ctx.caller,
            amount,
            kind,
            weights,
            is_short,
            benchmark_ref: portfolio.benchmark_ref,
        }];
        if !portfolio.is_open {
            events.push(ProtocolEvent::PortfolioClosed {
                owner: ctx.caller,
                value: SCALE,
            });
        }

        self.total_delegated = checked_add(self.total_delegated, amount)?;
        self.portfolios.insert(ctx.caller, portfolio);

        ledger.transfer_from(
            kind,
            &AccountId::PORTFOLIO_CUSTODY,
            &ctx.caller,
            &AccountId::PORTFOLIO_CUSTODY,
            amount,
        )?;

        tracing::debug!("Portfolio created by {} with {} {}", ctx.caller, amount, kind);
        Ok(events)
    }

    /// Re-weight the caller's portfolio, optionally adding principal.
    ///
    /// Holdings are re-derived at the current value, so a rebalance never
    /// changes what existing shares are worth. Setting the cash weight to 100
    /// closes the portfolio; any other allocation (re)opens it.
    #[allow(clippy::too_many_arguments)]
    pub fn rebalance_portfolio<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
        weights: Vec<u8>,
        is_short: Vec<bool>,
        add_amount: u128,
        kind: TokenKind,
        market: &MarketView<'_>,
        limits: &PortfolioLimits,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        validate_allocation(&weights, &is_short, market.assets)?;
        let portfolio = self
            .portfolios
            .get_mut(&ctx.caller)
            .ok_or(PollenError::PortfolioNotFound)?;

        let value = portfolio.value(market.prices)?;
        if add_amount > 0 {
            portfolio.ensure_room(add_amount, limits)?;
            portfolio.credit(&ctx.caller, kind, add_amount, value, market.benchmark_value)?;
        }

        let was_open = portfolio.is_open;
        portfolio.holdings = Holdings::derive(&weights, &is_short, value, market.prices)?;
        portfolio.weights = weights.clone();
        portfolio.is_open = weights[CASH_ASSET] as u32 != WEIGHT_TOTAL;

        let mut events = vec![ProtocolEvent::PortfolioRebalanced {
            owner: ctx.caller,
            weights,
            is_short,
            value,
            added: add_amount,
            kind,
            benchmark_ref: portfolio.benchmark_ref,
        }];
        if was_open && !portfolio.is_open {
            events.push(ProtocolEvent::PortfolioClosed {
                owner: ctx.caller,
                value,
            });
        }
        if !was_open && portfolio.is_open {
            tracing::info!("Portfolio of {} re-opened", ctx.caller);
        }

        self.total_delegated = checked_add(self.total_delegated, add_amount)?;
        if add_amount > 0 {
            ledger.transfer_from(
                kind,
                &AccountId::PORTFOLIO_CUSTODY,
                &ctx.caller,
                &AccountId::PORTFOLIO_CUSTODY,
                add_amount,
            )?;
        }
        Ok(events)
    }

    /// Deposit into another account's open portfolio.
    #[allow(clippy::too_many_arguments)]
    pub fn delegate<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
        owner: &AccountId,
        amount: u128,
        kind: TokenKind,
        market: &MarketView<'_>,
        limits: &PortfolioLimits,
    ) -> Result<ProtocolEvent, PollenError> {
        ctx.caller.ensure_nonzero()?;
        owner.ensure_nonzero()?;
        if amount == 0 {
            return Err(PollenError::InvalidAmount("delegation must be positive".to_string()));
        }
        let portfolio = self
            .portfolios
            .get_mut(owner)
            .ok_or(PollenError::PortfolioNotFound)?;
        if !portfolio.is_open {
            return Err(PollenError::PortfolioClosed);
        }
        portfolio.ensure_room(amount, limits)?;

        let value = portfolio.value(market.prices)?;
        portfolio.credit(&ctx.caller, kind, amount, value, market.benchmark_value)?;
        let benchmark_ref = portfolio.benchmark_ref;
        self.total_delegated = checked_add(self.total_delegated, amount)?;

        ledger.transfer_from(
            kind,
            &AccountId::PORTFOLIO_CUSTODY,
            &ctx.caller,
            &AccountId::PORTFOLIO_CUSTODY,
            amount,
        )?;

        tracing::debug!("{} delegated {} {} to {}", ctx.caller, amount, kind, owner);
        Ok(ProtocolEvent::Delegated {
            delegator: ctx.caller,
            owner: *owner,
            amount,
            kind,
            benchmark_ref,
        })
    }

    /// Batched `delegate`.
    ///
    /// # Errors
    /// `LengthMismatch` when the arrays differ, `ExceedsMaxOperations` past the
    /// configured batch size, then whatever the first failing deposit returns.
    #[allow(clippy::too_many_arguments)]
    pub fn multi_delegate<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
        owners: &[AccountId],
        amounts: &[u128],
        kind: TokenKind,
        market: &MarketView<'_>,
        limits: &PortfolioLimits,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        limits.check_batch(owners.len(), amounts.len())?;
        let mut events = Vec::with_capacity(owners.len());
        for (owner, &amount) in owners.iter().zip(amounts) {
            events.push(self.delegate(&mut *ledger, ctx, owner, amount, kind, market, limits)?);
        }
        Ok(events)
    }

    /// Remove `amount` of `withdrawer`'s principal of `kind`, burning the
    /// matching fraction of their shares and benchmark units (all of them on a
    /// full withdrawal).
    ///
    /// Returns `true` when this empties the portfolio and closes it.
    pub fn debit_principal(
        &mut self,
        owner: &AccountId,
        withdrawer: &AccountId,
        kind: TokenKind,
        amount: u128,
    ) -> Result<bool, PollenError> {
        let portfolio = self
            .portfolios
            .get_mut(owner)
            .ok_or(PollenError::PortfolioNotFound)?;
        let position = portfolio
            .positions
            .get_mut(withdrawer)
            .ok_or(PollenError::InsufficientDeposit {
                requested: amount,
                available: 0,
            })?;

        let deposit = position.deposit.get(kind);
        if amount > deposit || amount == 0 {
            return Err(PollenError::InsufficientDeposit {
                requested: amount,
                available: deposit,
            });
        }
        let shares = position.balance.get(kind);
        let units = position.benchmark_units.get(kind);
        let (burned_shares, burned_units) = if amount == deposit {
            (shares, units)
        } else {
            (mul_div(shares, amount, deposit)?, mul_div(units, amount, deposit)?)
        };

        *position.deposit.get_mut(kind) = deposit - amount;
        *position.balance.get_mut(kind) = shares - burned_shares;
        *position.benchmark_units.get_mut(kind) = units - burned_units;
        if position.deposit.is_zero() && position.balance.is_zero() {
            portfolio.positions.remove(withdrawer);
        }
        portfolio.total_deposited = checked_sub(portfolio.total_deposited, amount)?;
        portfolio.total_balance = checked_sub(portfolio.total_balance, burned_shares)?;
        self.total_delegated = checked_sub(self.total_delegated, amount)?;

        if portfolio.total_balance == 0 && portfolio.is_open {
            portfolio.is_open = false;
            tracing::info!("Portfolio of {} closed: no balance left", owner);
            return Ok(true);
        }
        Ok(false)
    }

    /// Re-enter `withdrawer`'s whole deposit of `kind` at the current index
    /// and benchmark values, leaving principal where it is.
    ///
    /// Shares become `deposit / value_now` and benchmark units
    /// `deposit / benchmark_value`. The portfolio reference is rebased as if
    /// the deposit had left and come back in at `benchmark_value`; for a sole
    /// depositor that is the current benchmark value.
    pub fn reset_entry(
        &mut self,
        owner: &AccountId,
        withdrawer: &AccountId,
        kind: TokenKind,
        value_now: u128,
        benchmark_value: u128,
    ) -> Result<(), PollenError> {
        if value_now == 0 || benchmark_value == 0 {
            return Err(PollenError::ZeroPortfolioValue);
        }
        let portfolio = self
            .portfolios
            .get_mut(owner)
            .ok_or(PollenError::PortfolioNotFound)?;
        let position = portfolio
            .positions
            .get_mut(withdrawer)
            .ok_or(PollenError::NoPositiveReturn)?;

        let deposit = position.deposit.get(kind);
        let old_shares = position.balance.get(kind);
        let new_shares = mul_div(deposit, SCALE, value_now)?;
        *position.balance.get_mut(kind) = new_shares;
        *position.benchmark_units.get_mut(kind) = mul_div(deposit, SCALE, benchmark_value)?;

        portfolio.total_balance =
            checked_add(checked_sub(portfolio.total_balance, old_shares)?, new_shares)?;
        let others = checked_sub(portfolio.total_deposited, deposit)?;
        portfolio.benchmark_ref =
            rebase_benchmark_ref(portfolio.benchmark_ref, others, benchmark_value, deposit)?;
        Ok(())
    }
}
