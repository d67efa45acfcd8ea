// crates/pollen-engine/src/protocol.rs
//
// The `Protocol` facade: every public entrypoint of the accounting core.
//
// Each entrypoint runs through `transact`, which executes the call on a clone
// of `ProtocolState` and commits the clone only if the call succeeds. Events
// are collected per call and appended to the event log after the commit, so a
// failed call leaves neither state nor events behind.
//
// Inside a call the order is always: validate, mutate local state (including
// the reward checkpoint ahead of any stake change), then ledger transfers,
// mints, and burns. Price snapshots are taken once per call.

use pollen_core::error::PollenError;
use pollen_core::events::{EventLog, ProtocolEvent};
use pollen_core::identity::{AccountId, CallContext, TokenKind};
use pollen_core::math::Fixed;
use pollen_core::traits::{AdminAuthority, EventSink, PriceSource, TokenLedger};
use pollen_economics::issuance::IssuanceSegment;
use pollen_economics::ledger::Ledger;
use pollen_economics::oracle::PriceSnapshot;
use pollen_economics::portfolio::MarketView;
use pollen_economics::settlement::{RewardSettlement, WithdrawalQuote};

use crate::state::ProtocolState;

/// The only admin is one fixed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleAdmin(pub AccountId);

impl AdminAuthority for SingleAdmin {
    fn is_admin(&self, account: &AccountId) -> bool {
        self.0 == *account
    }
}

/// New values for the runtime-adjustable limits. Amounts in whole PLN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsUpdate {
    pub min_portfolio_deposit: u64,
    pub max_portfolio_balance: u64,
    pub max_delegation_operations: usize,
    pub price_max_age: u64,
}

fn require_admin<A: AdminAuthority>(admin: &A, ctx: &CallContext) -> Result<(), PollenError> {
    if !admin.is_admin(&ctx.caller) {
        return Err(PollenError::Unauthorized(format!(
            "{} is not the protocol admin",
            ctx.caller
        )));
    }
    Ok(())
}

fn snapshot(
    state: &ProtocolState,
    prices: &dyn PriceSource,
    now: u64,
) -> Result<PriceSnapshot, PollenError> {
    PriceSnapshot::fetch(prices, &state.config.assets, now, state.config.price_max_age)
}

/// Run a withdrawal-family call against `state`.
fn with_settlement<T>(
    state: &mut ProtocolState,
    prices: &dyn PriceSource,
    now: u64,
    f: impl FnOnce(&mut RewardSettlement<'_, Ledger>) -> Result<T, PollenError>,
) -> Result<T, PollenError> {
    let snapshot = snapshot(state, prices, now)?;
    let benchmark_value = state.benchmark.value(&snapshot)?;
    let limits = state.limits()?;
    let terms = state.terms();
    let mut settlement = RewardSettlement {
        book: &mut state.book,
        escrow: &mut state.escrow,
        issuance: &mut state.issuance,
        ledger: &mut state.ledger,
        market: MarketView {
            assets: &state.config.assets,
            prices: &snapshot,
            benchmark_value,
        },
        terms,
        limits,
    };
    f(&mut settlement)
}

/// The accounting core behind one price source and one admin authority.
pub struct Protocol<P: PriceSource, A: AdminAuthority = SingleAdmin> {
    state: ProtocolState,
    prices: P,
    admin: A,
    log: EventLog,
}

impl<P: PriceSource, A: AdminAuthority> Protocol<P, A> {
    pub fn new(state: ProtocolState, prices: P, admin: A) -> Self {
        tracing::info!(
            "Protocol initialized with {} assets",
            state.config.asset_count()
        );
        Self {
            state,
            prices,
            admin,
            log: EventLog::new(),
        }
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn prices(&self) -> &P {
        &self.prices
    }

    /// The price source is external; hosts and tests update it directly.
    pub fn prices_mut(&mut self) -> &mut P {
        &mut self.prices
    }

    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    /// Direct ledger access for genesis funding outside any protocol call.
    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.state.ledger
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.log.add_sink(sink);
    }

    /// Execute `f` atomically.
    fn transact<F>(
        &mut self,
        ctx: &CallContext,
        operation: &str,
        f: F,
    ) -> Result<Vec<ProtocolEvent>, PollenError>
    where
        F: FnOnce(&mut ProtocolState, &P, &A) -> Result<Vec<ProtocolEvent>, PollenError>,
    {
        let mut draft = self.state.clone();
        match f(&mut draft, &self.prices, &self.admin) {
            Ok(events) => {
                self.state = draft;
                tracing::debug!(
                    "{} by {} at {} committed {} events",
                    operation,
                    ctx.caller,
                    ctx.now,
                    events.len()
                );
                self.log.append(ctx.now, events.clone());
                Ok(events)
            }
            Err(e) => {
                tracing::warn!("{} by {} rejected: {}", operation, ctx.caller, e);
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Vote escrow
    // -----------------------------------------------------------------------

    pub fn lock(
        &mut self,
        ctx: &CallContext,
        amount: u128,
        lock_end: u64,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "lock", |state, _, _| {
            Ok(vec![state.escrow.lock(&mut state.ledger, ctx, amount, lock_end)?])
        })
    }

    pub fn increase_lock(
        &mut self,
        ctx: &CallContext,
        amount: u128,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "increase_lock", |state, _, _| {
            Ok(vec![state.escrow.increase_lock(&mut state.ledger, ctx, amount)?])
        })
    }

    pub fn extend_lock(
        &mut self,
        ctx: &CallContext,
        new_end: u64,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "extend_lock", |state, _, _| {
            Ok(vec![state.escrow.extend_lock(ctx, new_end)?])
        })
    }

    pub fn unlock(&mut self, ctx: &CallContext) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "unlock", |state, _, _| {
            Ok(vec![state.escrow.unlock(&mut state.ledger, ctx)?])
        })
    }

    pub fn claim_rewards(&mut self, ctx: &CallContext) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "claim_rewards", |state, _, _| {
            Ok(vec![state.escrow.claim_rewards(&mut state.ledger, ctx)?])
        })
    }

    // -----------------------------------------------------------------------
    // Token ledger
    // -----------------------------------------------------------------------

    pub fn approve(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        spender: &AccountId,
        amount: u128,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "approve", |state, _, _| {
            state.ledger.approve(kind, &ctx.caller, spender, amount)?;
            Ok(Vec::new())
        })
    }

    pub fn transfer(
        &mut self,
        ctx: &CallContext,
        kind: TokenKind,
        to: &AccountId,
        amount: u128,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "transfer", |state, _, _| {
            state.ledger.transfer(kind, &ctx.caller, to, amount)?;
            Ok(Vec::new())
        })
    }

    // -----------------------------------------------------------------------
    // Admin
    // -----------------------------------------------------------------------

    pub fn initialize_issuance(
        &mut self,
        ctx: &CallContext,
        segments: Vec<IssuanceSegment>,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "initialize_issuance", |state, _, admin| {
            require_admin(admin, ctx)?;
            Ok(vec![state.issuance.initialize(segments)?])
        })
    }

    pub fn create_benchmark(
        &mut self,
        ctx: &CallContext,
        weights: Vec<u8>,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "create_benchmark", |state, prices, admin| {
            require_admin(admin, ctx)?;
            let snapshot = snapshot(state, prices, ctx.now)?;
            Ok(vec![state
                .benchmark
                .initialize(weights, &state.config.assets, &snapshot)?])
        })
    }

    pub fn set_reward_rate(
        &mut self,
        ctx: &CallContext,
        rate: u128,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "set_reward_rate", |state, _, admin| {
            require_admin(admin, ctx)?;
            Ok(vec![state.escrow.set_reward_rate(rate, ctx.now)?])
        })
    }

    pub fn update_limits(
        &mut self,
        ctx: &CallContext,
        update: LimitsUpdate,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "update_limits", |state, _, admin| {
            require_admin(admin, ctx)?;
            let mut config = state.config.clone();
            config.min_portfolio_deposit = update.min_portfolio_deposit;
            config.max_portfolio_balance = update.max_portfolio_balance;
            config.max_delegation_operations = update.max_delegation_operations;
            config.price_max_age = update.price_max_age;
            config.validate()?;

            let event = ProtocolEvent::LimitsUpdated {
                min_portfolio_deposit: config.min_portfolio_deposit_units()?,
                max_portfolio_balance: config.max_portfolio_balance_units()?,
                max_delegation_operations: config.max_delegation_operations,
                price_max_age: config.price_max_age,
            };
            state.config = config;
            Ok(vec![event])
        })
    }

    // -----------------------------------------------------------------------
    // Portfolios
    // -----------------------------------------------------------------------

    pub fn create_portfolio(
        &mut self,
        ctx: &CallContext,
        weights: Vec<u8>,
        is_short: Vec<bool>,
        amount: u128,
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "create_portfolio", |state, prices, _| {
            let snapshot = snapshot(state, prices, ctx.now)?;
            let benchmark_value = state.benchmark.value(&snapshot)?;
            let limits = state.limits()?;
            let market = MarketView {
                assets: &state.config.assets,
                prices: &snapshot,
                benchmark_value,
            };
            state.book.create_portfolio(
                &mut state.ledger,
                ctx,
                weights,
                is_short,
                amount,
                kind,
                &market,
                &limits,
            )
        })
    }

    pub fn rebalance_portfolio(
        &mut self,
        ctx: &CallContext,
        weights: Vec<u8>,
        is_short: Vec<bool>,
        add_amount: u128,
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "rebalance_portfolio", |state, prices, _| {
            let snapshot = snapshot(state, prices, ctx.now)?;
            let benchmark_value = state.benchmark.value(&snapshot)?;
            let limits = state.limits()?;
            let market = MarketView {
                assets: &state.config.assets,
                prices: &snapshot,
                benchmark_value,
            };
            state.book.rebalance_portfolio(
                &mut state.ledger,
                ctx,
                weights,
                is_short,
                add_amount,
                kind,
                &market,
                &limits,
            )
        })
    }

    pub fn delegate_pollen(
        &mut self,
        ctx: &CallContext,
        owner: &AccountId,
        amount: u128,
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.multi_delegate_pollen(ctx, std::slice::from_ref(owner), &[amount], kind)
    }

    pub fn multi_delegate_pollen(
        &mut self,
        ctx: &CallContext,
        owners: &[AccountId],
        amounts: &[u128],
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "delegate_pollen", |state, prices, _| {
            let snapshot = snapshot(state, prices, ctx.now)?;
            let benchmark_value = state.benchmark.value(&snapshot)?;
            let limits = state.limits()?;
            let market = MarketView {
                assets: &state.config.assets,
                prices: &snapshot,
                benchmark_value,
            };
            state
                .book
                .multi_delegate(&mut state.ledger, ctx, owners, amounts, kind, &market, &limits)
        })
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        owner: &AccountId,
        amount: u128,
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "withdraw", |state, prices, _| {
            with_settlement(state, prices, ctx.now, |s| s.withdraw(ctx, owner, amount, kind))
        })
    }

    pub fn withdraw_rewards(
        &mut self,
        ctx: &CallContext,
        owner: &AccountId,
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "withdraw_rewards", |state, prices, _| {
            with_settlement(state, prices, ctx.now, |s| {
                Ok(vec![s.withdraw_rewards(ctx, owner, kind)?])
            })
        })
    }

    pub fn withdraw_many(
        &mut self,
        ctx: &CallContext,
        owners: &[AccountId],
        amounts: &[u128],
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "withdraw_many", |state, prices, _| {
            with_settlement(state, prices, ctx.now, |s| {
                s.withdraw_many(ctx, owners, amounts, kind)
            })
        })
    }

    pub fn withdraw_rewards_many(
        &mut self,
        ctx: &CallContext,
        owners: &[AccountId],
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.transact(ctx, "withdraw_rewards_many", |state, prices, _| {
            with_settlement(state, prices, ctx.now, |s| {
                s.withdraw_rewards_many(ctx, owners, kind)
            })
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn voting_power(&self, account: &AccountId, t: u64) -> Result<u128, PollenError> {
        self.state.escrow.voting_power(account, t)
    }

    pub fn total_voting_power(&self, t: u64) -> Result<u128, PollenError> {
        self.state.escrow.total_voting_power(t)
    }

    pub fn voting_power_share(&self, account: &AccountId, t: u64) -> Result<Fixed, PollenError> {
        self.state.escrow.voting_power_share(account, t)
    }

    pub fn claimable_rewards(&self, account: &AccountId, now: u64) -> Result<u128, PollenError> {
        self.state.escrow.claimable_rewards(account, now)
    }

    /// Issuance headroom left at `t`.
    pub fn max_allocation(&self, t: u64) -> Result<u128, PollenError> {
        self.state
            .issuance
            .max_allocation(t, self.state.issuance.issued())
    }

    pub fn current_value(&self, owner: &AccountId, now: u64) -> Result<u128, PollenError> {
        let snapshot = snapshot(&self.state, &self.prices, now)?;
        self.state.book.current_value(owner, &snapshot)
    }

    pub fn benchmark_value(&self, now: u64) -> Result<u128, PollenError> {
        let snapshot = snapshot(&self.state, &self.prices, now)?;
        self.state.benchmark.value(&snapshot)
    }

    /// Price a withdrawal without applying it.
    pub fn quote_withdrawal(
        &self,
        owner: &AccountId,
        withdrawer: &AccountId,
        kind: TokenKind,
        amount: u128,
        now: u64,
    ) -> Result<WithdrawalQuote, PollenError> {
        let mut scratch = self.state.clone();
        with_settlement(&mut scratch, &self.prices, now, |s| {
            s.quote(owner, withdrawer, kind, amount, now)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollen_core::config::{ProtocolConfig, DAY, YEAR};
    use pollen_core::math::SCALE;
    use pollen_economics::oracle::StaticPriceFeed;

    const T0: u64 = 1_700_000_000;

    fn admin() -> AccountId {
        AccountId::from_label("admin")
    }

    fn alice() -> AccountId {
        AccountId::from_label("alice")
    }

    fn protocol() -> Protocol<StaticPriceFeed> {
        let state = ProtocolState::new(ProtocolConfig::default(), T0).unwrap();
        let mut feed = StaticPriceFeed::new();
        feed.set_price(1, 2_000 * SCALE, T0);
        feed.set_price(2, 30_000 * SCALE, T0);
        feed.set_price(3, 5 * SCALE, T0);
        let mut protocol = Protocol::new(state, feed, SingleAdmin(admin()));
        protocol
            .ledger_mut()
            .mint(TokenKind::Pollen, &alice(), 1_000 * SCALE)
            .unwrap();
        protocol
    }

    #[test]
    fn test_admin_gate() {
        let mut protocol = protocol();
        let result = protocol.create_benchmark(&CallContext::new(alice(), T0), vec![100, 0, 0, 0]);
        assert!(matches!(result, Err(PollenError::Unauthorized(_))));
        assert!(protocol.events().is_empty());

        protocol
            .create_benchmark(&CallContext::new(admin(), T0), vec![100, 0, 0, 0])
            .unwrap();
        assert_eq!(protocol.events().len(), 1);
        assert_eq!(protocol.benchmark_value(T0).unwrap(), SCALE);
    }

    #[test]
    fn test_failed_call_rolls_back_everything() {
        let mut protocol = protocol();
        let ctx = CallContext::new(alice(), T0);
        protocol
            .approve(&ctx, TokenKind::Pollen, &AccountId::ESCROW_CUSTODY, 100 * SCALE)
            .unwrap();

        // The escrow's local effects apply before the ledger pull fails on
        // the allowance; none of them may survive.
        let result = protocol.lock(&ctx, 500 * SCALE, T0 + YEAR);
        assert!(matches!(result, Err(PollenError::InsufficientAllowance { .. })));
        assert_eq!(protocol.state().escrow.total_locked(), 0);
        assert!(protocol.state().escrow.lock_of(&alice()).is_none());
        assert_eq!(protocol.ledger().balance_of(TokenKind::Pollen, &alice()), 1_000 * SCALE);
        assert!(protocol.events().is_empty());

        protocol.lock(&ctx, 100 * SCALE, T0 + YEAR).unwrap();
        assert_eq!(protocol.events().len(), 1);
        assert_eq!(protocol.events().records()[0].timestamp, T0);
    }

    #[test]
    fn test_update_limits() {
        let mut protocol = protocol();
        let update = LimitsUpdate {
            min_portfolio_deposit: 5,
            max_portfolio_balance: 50,
            max_delegation_operations: 2,
            price_max_age: 60,
        };
        assert!(protocol
            .update_limits(&CallContext::new(alice(), T0), update)
            .is_err());
        let events = protocol
            .update_limits(&CallContext::new(admin(), T0), update)
            .unwrap();
        assert_eq!(
            events[0],
            ProtocolEvent::LimitsUpdated {
                min_portfolio_deposit: 5 * SCALE,
                max_portfolio_balance: 50 * SCALE,
                max_delegation_operations: 2,
                price_max_age: 60
            }
        );
        assert_eq!(protocol.state().config.price_max_age, 60);

        let inverted = LimitsUpdate {
            min_portfolio_deposit: 100,
            ..update
        };
        assert!(matches!(
            protocol.update_limits(&CallContext::new(admin(), T0), inverted),
            Err(PollenError::Config(_))
        ));
    }

    #[test]
    fn test_stale_prices_reject_portfolio_calls() {
        let mut protocol = protocol();
        protocol
            .create_benchmark(&CallContext::new(admin(), T0), vec![100, 0, 0, 0])
            .unwrap();
        let ctx = CallContext::new(alice(), T0 + 2 * DAY);
        protocol
            .approve(&ctx, TokenKind::Pollen, &AccountId::PORTFOLIO_CUSTODY, u128::MAX)
            .unwrap();
        let result = protocol.create_portfolio(
            &ctx,
            vec![0, 100, 0, 0],
            vec![false; 4],
            10 * SCALE,
            TokenKind::Pollen,
        );
        assert!(matches!(result, Err(PollenError::StalePriceFeed { .. })));

        protocol.prices_mut().touch_all(T0 + 2 * DAY);
        assert!(protocol
            .create_portfolio(
                &ctx,
                vec![0, 100, 0, 0],
                vec![false; 4],
                10 * SCALE,
                TokenKind::Pollen
            )
            .is_ok());
    }
}
