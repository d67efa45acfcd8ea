// crates/pollen-economics/src/settlement.rs
//
// Withdrawal settlement.
//
// Both returns are measured from the position's own entry: `balance` shares
// were bought at the index value and `benchmark_units` at the benchmark value
// of each deposit, so a position that tracks the benchmark nets zero whenever
// it entered.
//
// Each withdrawal is priced fresh from current state:
//   portfolio_return = value_now * balance / deposit - 1
//   benchmark_return = benchmark_now * benchmark_units / deposit - 1
//   net_return       = portfolio_return - benchmark_return
//   boost            = min(voting_share * boost_scale, boost_cap)   (vePLN only)
//   boosted_return   = net_return * (1 + boost)
//
// A non-negative boosted return takes the reward path: principal comes back
// in its own kind and `amount * boosted_return` PLN is minted, capped by the
// withdrawal's pro-rata slice of issuance headroom. A third party pays the
// portfolio owner a performance fee out of that reward.
//
// A negative boosted return takes the penalty path: `amount * |boosted|` of
// the principal is burned from portfolio custody and the rest returned. For a
// vePLN deposit the locked PLN backing the burned receipt is forfeited and
// burned with it.

use serde::Serialize;

use pollen_core::config::ProtocolConfig;
use pollen_core::error::PollenError;
use pollen_core::events::ProtocolEvent;
use pollen_core::identity::{AccountId, CallContext, TokenKind};
use pollen_core::math::{apply_bps, checked_sub, mul_div, Fixed};
use pollen_core::traits::TokenLedger;

use crate::escrow::VoteEscrow;
use crate::issuance::IssuanceSchedule;
use crate::portfolio::{MarketView, PortfolioBook, PortfolioLimits};

/// Boost and fee parameters, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementTerms {
    pub boost_scale_bps: u32,
    pub boost_cap_bps: u32,
    pub owner_fee_bps: u32,
}

impl SettlementTerms {
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            boost_scale_bps: config.boost_scale_bps,
            boost_cap_bps: config.boost_cap_bps,
            owner_fee_bps: config.owner_fee_bps,
        }
    }
}

/// The intermediate returns behind one settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnBreakdown {
    pub portfolio_return: Fixed,
    pub benchmark_return: Fixed,
    pub net_return: Fixed,
    pub boost: Fixed,
    pub boosted_return: Fixed,
}

/// Compute the return breakdown for a position.
///
/// # Arguments
/// - `deposit`, `balance`, `benchmark_units`: the position's principal,
///   shares, and benchmark units of one kind.
/// - `value_now`, `benchmark_now`: index and benchmark values now.
/// - `voting_share`: the withdrawer's share of voting power; pass zero for
///   PLN deposits, which are never boosted.
pub fn compute_breakdown(
    deposit: u128,
    balance: u128,
    benchmark_units: u128,
    value_now: u128,
    benchmark_now: u128,
    voting_share: Fixed,
    terms: &SettlementTerms,
) -> Result<ReturnBreakdown, PollenError> {
    let gross = Fixed::from_scaled(mul_div(value_now, balance, deposit)?)?;
    let portfolio_return = gross.checked_sub(Fixed::ONE)?;
    let benchmark_gross = Fixed::from_scaled(mul_div(benchmark_now, benchmark_units, deposit)?)?;
    let benchmark_return = benchmark_gross.checked_sub(Fixed::ONE)?;
    let net_return = portfolio_return.checked_sub(benchmark_return)?;

    let boost = voting_share
        .checked_mul(Fixed::from_bps(terms.boost_scale_bps))?
        .min(Fixed::from_bps(terms.boost_cap_bps));
    let boosted_return = net_return.checked_mul(Fixed::ONE.checked_add(boost)?)?;

    Ok(ReturnBreakdown {
        portfolio_return,
        benchmark_return,
        net_return,
        boost,
        boosted_return,
    })
}

/// How a withdrawn amount splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Reward {
        /// PLN minted in total.
        reward: u128,
        /// Part of `reward` that goes to the portfolio owner.
        owner_fee: u128,
    },
    Penalty {
        returned: u128,
        burned: u128,
    },
}

/// Split `amount` according to `boosted_return`.
///
/// `headroom` caps the reward; `fee_bps` is the owner's cut (zero when the
/// owner is the one withdrawing).
pub fn settle_amount(
    amount: u128,
    boosted_return: Fixed,
    headroom: u128,
    fee_bps: u32,
) -> Result<Outcome, PollenError> {
    if boosted_return.is_negative() {
        let burned = boosted_return.mul_amount(amount)?.min(amount);
        return Ok(Outcome::Penalty {
            returned: amount - burned,
            burned,
        });
    }
    let reward = boosted_return.mul_amount(amount)?.min(headroom);
    Ok(Outcome::Reward {
        reward,
        owner_fee: apply_bps(reward, fee_bps)?,
    })
}

/// A priced, not yet applied withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawalQuote {
    pub amount: u128,
    pub value_now: u128,
    pub benchmark_now: u128,
    pub breakdown: ReturnBreakdown,
    pub outcome: Outcome,
}

/// Settles withdrawals against the portfolio book, the escrow, the issuance
/// schedule, and the token ledger of one call.
pub struct RewardSettlement<'a, L: TokenLedger> {
    pub book: &'a mut PortfolioBook,
    pub escrow: &'a mut VoteEscrow,
    pub issuance: &'a mut IssuanceSchedule,
    pub ledger: &'a mut L,
    pub market: MarketView<'a>,
    pub terms: SettlementTerms,
    pub limits: PortfolioLimits,
}

impl<'a, L: TokenLedger> RewardSettlement<'a, L> {
    /// Issuance headroom apportioned to `amount` of delegated principal.
    fn headroom(&self, amount: u128, now: u64) -> Result<u128, PollenError> {
        if !self.issuance.is_initialized() {
            tracing::warn!("Issuance schedule not initialized: rewards capped at zero");
            return Ok(0);
        }
        let total = self.book.total_delegated();
        if total == 0 {
            return Ok(0);
        }
        mul_div(self.issuance.available(now)?, amount, total)
    }

    /// Price a withdrawal of `amount` of `withdrawer`'s `kind` principal from
    /// `owner`'s portfolio without applying it.
    pub fn quote(
        &self,
        owner: &AccountId,
        withdrawer: &AccountId,
        kind: TokenKind,
        amount: u128,
        now: u64,
    ) -> Result<WithdrawalQuote, PollenError> {
        let portfolio = self.book.get(owner).ok_or(PollenError::PortfolioNotFound)?;
        let position = portfolio.position(withdrawer).copied().unwrap_or_default();
        let deposit = position.deposit.get(kind);
        if amount == 0 {
            return Err(PollenError::InvalidAmount("withdrawal must be positive".to_string()));
        }
        if amount > deposit {
            return Err(PollenError::InsufficientDeposit {
                requested: amount,
                available: deposit,
            });
        }

        let value_now = portfolio.value(self.market.prices)?;
        let voting_share = match kind {
            TokenKind::VePollen => self.escrow.voting_power_share(withdrawer, now)?,
            TokenKind::Pollen => Fixed::ZERO,
        };
        let breakdown = compute_breakdown(
            deposit,
            position.balance.get(kind),
            position.benchmark_units.get(kind),
            value_now,
            self.market.benchmark_value,
            voting_share,
            &self.terms,
        )?;

        let fee_bps = if withdrawer == owner {
            0
        } else {
            self.terms.owner_fee_bps
        };
        let outcome = settle_amount(
            amount,
            breakdown.boosted_return,
            self.headroom(amount, now)?,
            fee_bps,
        )?;

        Ok(WithdrawalQuote {
            amount,
            value_now,
            benchmark_now: self.market.benchmark_value,
            breakdown,
            outcome,
        })
    }

    /// Withdraw `amount` of principal of `kind` from `owner`'s portfolio.
    ///
    /// # Errors
    /// `PortfolioNotFound`, `InvalidAmount`, `InsufficientDeposit`,
    /// `ExceedsIssuanceCap`, and any ledger failure.
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        owner: &AccountId,
        amount: u128,
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        let withdrawer = ctx.caller;
        let quote = self.quote(owner, &withdrawer, kind, amount, ctx.now)?;
        let boosted_return = quote.breakdown.boosted_return;

        let closed = self.book.debit_principal(owner, &withdrawer, kind, amount)?;
        let mut events = match quote.outcome {
            Outcome::Reward { reward, owner_fee } => {
                self.issuance.record_issuance(reward, ctx.now)?;

                self.ledger
                    .transfer(kind, &AccountId::PORTFOLIO_CUSTODY, &withdrawer, amount)?;
                self.pay_reward(owner, &withdrawer, reward, owner_fee)?;

                tracing::info!(
                    "{} withdrew {} {} from {} with reward {} (fee {})",
                    withdrawer,
                    amount,
                    kind,
                    owner,
                    reward,
                    owner_fee
                );
                vec![ProtocolEvent::WithdrawWithReward {
                    owner: *owner,
                    withdrawer,
                    kind,
                    principal: amount,
                    reward,
                    owner_fee,
                    boosted_return,
                }]
            }
            Outcome::Penalty { returned, burned } => {
                if kind == TokenKind::VePollen {
                    self.escrow.forfeit(&withdrawer, burned, ctx.now)?;
                }

                if returned > 0 {
                    self.ledger
                        .transfer(kind, &AccountId::PORTFOLIO_CUSTODY, &withdrawer, returned)?;
                }
                if burned > 0 {
                    self.ledger.burn(kind, &AccountId::PORTFOLIO_CUSTODY, burned)?;
                    if kind == TokenKind::VePollen {
                        self.ledger
                            .burn(TokenKind::Pollen, &AccountId::ESCROW_CUSTODY, burned)?;
                    }
                }

                tracing::info!(
                    "{} withdrew {} {} from {} with penalty: {} returned, {} burned",
                    withdrawer,
                    amount,
                    kind,
                    owner,
                    returned,
                    burned
                );
                vec![ProtocolEvent::WithdrawWithPenalty {
                    owner: *owner,
                    withdrawer,
                    kind,
                    returned,
                    burned,
                    boosted_return,
                }]
            }
        };

        if closed {
            events.push(ProtocolEvent::PortfolioClosed {
                owner: *owner,
                value: quote.value_now,
            });
        }
        Ok(events)
    }

    /// Take the reward on the caller's whole `kind` deposit, leaving the
    /// principal in place and restarting its measurement from now.
    ///
    /// # Errors
    /// `NoPositiveReturn` when the caller has no such deposit, the boosted
    /// return is not positive, or issuance headroom leaves nothing to mint.
    /// The position is left untouched in every case.
    pub fn withdraw_rewards(
        &mut self,
        ctx: &CallContext,
        owner: &AccountId,
        kind: TokenKind,
    ) -> Result<ProtocolEvent, PollenError> {
        let withdrawer = ctx.caller;
        let deposit = self
            .book
            .get(owner)
            .ok_or(PollenError::PortfolioNotFound)?
            .position(&withdrawer)
            .map(|p| p.deposit.get(kind))
            .unwrap_or(0);
        if deposit == 0 {
            return Err(PollenError::NoPositiveReturn);
        }

        let quote = self.quote(owner, &withdrawer, kind, deposit, ctx.now)?;
        let boosted_return = quote.breakdown.boosted_return;
        let (reward, owner_fee) = match quote.outcome {
            Outcome::Reward { reward, owner_fee }
                if boosted_return > Fixed::ZERO && reward > 0 =>
            {
                (reward, owner_fee)
            }
            _ => return Err(PollenError::NoPositiveReturn),
        };

        self.issuance.record_issuance(reward, ctx.now)?;
        self.book
            .reset_entry(owner, &withdrawer, kind, quote.value_now, quote.benchmark_now)?;

        self.pay_reward(owner, &withdrawer, reward, owner_fee)?;

        tracing::info!(
            "{} took reward {} on {} {} in {}",
            withdrawer,
            reward,
            deposit,
            kind,
            owner
        );
        Ok(ProtocolEvent::WithdrawWithReward {
            owner: *owner,
            withdrawer,
            kind,
            principal: 0,
            reward,
            owner_fee,
            boosted_return,
        })
    }

    /// Batched `withdraw`, one (owner, amount) pair per entry.
    pub fn withdraw_many(
        &mut self,
        ctx: &CallContext,
        owners: &[AccountId],
        amounts: &[u128],
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.limits.check_batch(owners.len(), amounts.len())?;
        let mut events = Vec::new();
        for (owner, &amount) in owners.iter().zip(amounts) {
            events.extend(self.withdraw(ctx, owner, amount, kind)?);
        }
        Ok(events)
    }

    /// Batched `withdraw_rewards`.
    pub fn withdraw_rewards_many(
        &mut self,
        ctx: &CallContext,
        owners: &[AccountId],
        kind: TokenKind,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        self.limits.check_batch(owners.len(), owners.len())?;
        owners
            .iter()
            .map(|owner| self.withdraw_rewards(ctx, owner, kind))
            .collect()
    }

    fn pay_reward(
        &mut self,
        owner: &AccountId,
        withdrawer: &AccountId,
        reward: u128,
        owner_fee: u128,
    ) -> Result<(), PollenError> {
        let net = checked_sub(reward, owner_fee)?;
        if net > 0 {
            self.ledger.mint(TokenKind::Pollen, withdrawer, net)?;
        }
        if owner_fee > 0 {
            self.ledger.mint(TokenKind::Pollen, owner, owner_fee)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollen_core::config::{AssetConfig, DAY, YEAR};
    use pollen_core::math::SCALE;

    use crate::issuance::IssuanceSegment;
    use crate::ledger::Ledger;
    use crate::oracle::PriceSnapshot;

    const T0: u64 = 1_700_000_000;

    fn terms() -> SettlementTerms {
        SettlementTerms::from_config(&ProtocolConfig::default())
    }

    fn pct(n: i128) -> Fixed {
        Fixed::from_raw(n * (SCALE as i128) / 100)
    }

    #[test]
    fn test_breakdown_unboosted() {
        // Index up 30%, benchmark up 10%.
        let b = compute_breakdown(
            100 * SCALE,
            100 * SCALE,
            100 * SCALE,
            SCALE * 13 / 10,
            SCALE * 11 / 10,
            Fixed::ZERO,
            &terms(),
        )
        .unwrap();
        assert_eq!(b.portfolio_return, pct(30));
        assert_eq!(b.benchmark_return, pct(10));
        assert_eq!(b.net_return, pct(20));
        assert_eq!(b.boost, Fixed::ZERO);
        assert_eq!(b.boosted_return, pct(20));
    }

    #[test]
    fn test_boost_is_capped_and_amplifies_losses() {
        // Full voting share would be a 100% boost; the cap holds it to 20%.
        let b = compute_breakdown(
            100 * SCALE,
            100 * SCALE,
            100 * SCALE,
            SCALE * 9 / 10,
            SCALE,
            Fixed::ONE,
            &terms(),
        )
        .unwrap();
        assert_eq!(b.boost, pct(20));
        assert_eq!(b.boosted_return, pct(-12));

        let b = compute_breakdown(
            100 * SCALE,
            100 * SCALE,
            100 * SCALE,
            SCALE * 9 / 10,
            SCALE,
            pct(10),
            &terms(),
        )
        .unwrap();
        assert_eq!(b.boost, pct(10));
        assert_eq!(b.boosted_return, pct(-11));
    }

    #[test]
    fn test_settle_penalty_returns_remainder() {
        let outcome = settle_amount(100 * SCALE, pct(-10), 0, 2_000).unwrap();
        assert_eq!(
            outcome,
            Outcome::Penalty {
                returned: 90 * SCALE,
                burned: 10 * SCALE
            }
        );
        // Losses past 100% burn everything and no more.
        let outcome = settle_amount(100 * SCALE, pct(-150), 0, 0).unwrap();
        assert_eq!(
            outcome,
            Outcome::Penalty {
                returned: 0,
                burned: 100 * SCALE
            }
        );
    }

    #[test]
    fn test_settle_reward_fee_and_cap() {
        assert_eq!(
            settle_amount(100 * SCALE, pct(10), u128::MAX, 2_000).unwrap(),
            Outcome::Reward {
                reward: 10 * SCALE,
                owner_fee: 2 * SCALE
            }
        );
        assert_eq!(
            settle_amount(100 * SCALE, pct(10), u128::MAX, 0).unwrap(),
            Outcome::Reward {
                reward: 10 * SCALE,
                owner_fee: 0
            }
        );
        assert_eq!(
            settle_amount(100 * SCALE, pct(10), 4 * SCALE, 0).unwrap(),
            Outcome::Reward {
                reward: 4 * SCALE,
                owner_fee: 0
            }
        );
    }

    struct Fixture {
        book: PortfolioBook,
        escrow: VoteEscrow,
        issuance: IssuanceSchedule,
        ledger: Ledger,
        assets: Vec<AssetConfig>,
    }

    fn owner() -> AccountId {
        AccountId::from_label("owner")
    }

    fn prices(weth: u128) -> PriceSnapshot {
        PriceSnapshot::from_prices(vec![SCALE, weth * SCALE, 30_000 * SCALE, 5 * SCALE])
    }

    fn limits() -> PortfolioLimits {
        PortfolioLimits::from_config(&ProtocolConfig::default()).unwrap()
    }

    /// Owner holds 100 PLN in an all-WETH portfolio created at WETH = 2000,
    /// benchmark flat at 1.0, generous issuance.
    fn fixture() -> Fixture {
        let mut ledger = Ledger::new();
        ledger.mint(TokenKind::Pollen, &owner(), 1_000 * SCALE).unwrap();
        ledger
            .approve(TokenKind::Pollen, &owner(), &AccountId::PORTFOLIO_CUSTODY, u128::MAX)
            .unwrap();
        let mut issuance = IssuanceSchedule::new();
        issuance
            .initialize(vec![IssuanceSegment {
                max_time: T0 + YEAR,
                offset_x: T0 - DAY,
                offset_y: 1_000_000 * SCALE,
                rate: 0,
            }])
            .unwrap();

        let assets = ProtocolConfig::default().assets;
        let mut book = PortfolioBook::new();
        let snapshot = prices(2_000);
        let market = MarketView {
            assets: &assets,
            prices: &snapshot,
            benchmark_value: SCALE,
        };
        book.create_portfolio(
            &mut ledger,
            &CallContext::new(owner(), T0),
            vec![0, 100, 0, 0],
            vec![false; 4],
            100 * SCALE,
            TokenKind::Pollen,
            &market,
            &limits(),
        )
        .unwrap();

        Fixture {
            book,
            escrow: VoteEscrow::new(7 * DAY, 4 * YEAR, 0, T0),
            issuance,
            ledger,
            assets,
        }
    }

    fn settle<'a>(f: &'a mut Fixture, snapshot: &'a PriceSnapshot) -> RewardSettlement<'a, Ledger> {
        settle_at(f, snapshot, SCALE)
    }

    fn settle_at<'a>(
        f: &'a mut Fixture,
        snapshot: &'a PriceSnapshot,
        benchmark_value: u128,
    ) -> RewardSettlement<'a, Ledger> {
        RewardSettlement {
            book: &mut f.book,
            escrow: &mut f.escrow,
            issuance: &mut f.issuance,
            ledger: &mut f.ledger,
            market: MarketView {
                assets: &f.assets,
                prices: snapshot,
                benchmark_value,
            },
            terms: terms(),
            limits: limits(),
        }
    }

    #[test]
    fn test_owner_withdraw_with_reward_closes_portfolio() {
        let mut f = fixture();
        let snapshot = prices(2_200);
        let events = settle(&mut f, &snapshot)
            .withdraw(&CallContext::new(owner(), T0 + DAY), &owner(), 100 * SCALE, TokenKind::Pollen)
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ProtocolEvent::WithdrawWithReward {
                owner: owner(),
                withdrawer: owner(),
                kind: TokenKind::Pollen,
                principal: 100 * SCALE,
                reward: 10 * SCALE,
                owner_fee: 0,
                boosted_return: pct(10),
            }
        );
        assert_eq!(events[1].name(), "PortfolioClosed");
        assert_eq!(f.ledger.balance_of(TokenKind::Pollen, &owner()), 1_010 * SCALE);
        assert_eq!(f.issuance.issued(), 10 * SCALE);
        assert_eq!(f.book.total_delegated(), 0);
    }

    #[test]
    fn test_withdraw_with_penalty_burns_shortfall() {
        let mut f = fixture();
        let snapshot = prices(1_800);
        let events = settle(&mut f, &snapshot)
            .withdraw(&CallContext::new(owner(), T0 + DAY), &owner(), 100 * SCALE, TokenKind::Pollen)
            .unwrap();
        assert_eq!(
            events[0],
            ProtocolEvent::WithdrawWithPenalty {
                owner: owner(),
                withdrawer: owner(),
                kind: TokenKind::Pollen,
                returned: 90 * SCALE,
                burned: 10 * SCALE,
                boosted_return: pct(-10),
            }
        );
        assert_eq!(f.ledger.balance_of(TokenKind::Pollen, &owner()), 990 * SCALE);
        assert_eq!(f.ledger.total_supply(TokenKind::Pollen), 990 * SCALE);
    }

    #[test]
    fn test_withdraw_rewards_restarts_measurement() {
        let mut f = fixture();
        let snapshot = prices(2_200);
        let ctx = CallContext::new(owner(), T0 + DAY);
        let event = settle(&mut f, &snapshot)
            .withdraw_rewards(&ctx, &owner(), TokenKind::Pollen)
            .unwrap();
        assert!(matches!(
            event,
            ProtocolEvent::WithdrawWithReward {
                principal: 0,
                reward,
                ..
            } if reward == 10 * SCALE
        ));

        // Nothing left to take at unchanged prices.
        assert_eq!(
            settle(&mut f, &snapshot).withdraw_rewards(&ctx, &owner(), TokenKind::Pollen),
            Err(PollenError::NoPositiveReturn)
        );
        let portfolio = f.book.get(&owner()).unwrap();
        assert_eq!(portfolio.position(&owner()).unwrap().deposit.pollen, 100 * SCALE);
    }

    #[test]
    fn test_withdraw_rewards_rejects_losses() {
        let mut f = fixture();
        let snapshot = prices(1_800);
        assert_eq!(
            settle(&mut f, &snapshot).withdraw_rewards(
                &CallContext::new(owner(), T0 + DAY),
                &owner(),
                TokenKind::Pollen
            ),
            Err(PollenError::NoPositiveReturn)
        );
    }

    #[test]
    fn test_withdraw_more_than_deposit() {
        let mut f = fixture();
        let snapshot = prices(2_000);
        let result = settle(&mut f, &snapshot).withdraw(
            &CallContext::new(owner(), T0 + DAY),
            &owner(),
            101 * SCALE,
            TokenKind::Pollen,
        );
        assert_eq!(
            result,
            Err(PollenError::InsufficientDeposit {
                requested: 101 * SCALE,
                available: 100 * SCALE
            })
        );
    }

    #[test]
    fn test_withdraw_many_batch_checks() {
        let mut f = fixture();
        let snapshot = prices(2_000);
        let ctx = CallContext::new(owner(), T0 + DAY);
        assert!(matches!(
            settle(&mut f, &snapshot).withdraw_many(&ctx, &[owner()], &[], TokenKind::Pollen),
            Err(PollenError::LengthMismatch { .. })
        ));
        assert!(matches!(
            settle(&mut f, &snapshot).withdraw_rewards_many(&ctx, &[owner(); 11], TokenKind::Pollen),
            Err(PollenError::ExceedsMaxOperations { .. })
        ));
        let events = settle(&mut f, &snapshot)
            .withdraw_many(&ctx, &[owner(), owner()], &[40 * SCALE, 60 * SCALE], TokenKind::Pollen)
            .unwrap();
        // Two withdrawals plus the close.
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_withdraw_rewards_without_headroom_keeps_entry() {
        let mut f = fixture();
        f.issuance = IssuanceSchedule::new();
        let snapshot = prices(2_200);
        let ctx = CallContext::new(owner(), T0 + DAY);
        let before = *f.book.get(&owner()).unwrap().position(&owner()).unwrap();

        assert_eq!(
            settle(&mut f, &snapshot).withdraw_rewards(&ctx, &owner(), TokenKind::Pollen),
            Err(PollenError::NoPositiveReturn)
        );
        assert_eq!(
            *f.book.get(&owner()).unwrap().position(&owner()).unwrap(),
            before
        );
        assert_eq!(f.issuance.issued(), 0);
        assert_eq!(f.ledger.balance_of(TokenKind::Pollen, &owner()), 900 * SCALE);

        // Once issuance exists the accrued gain is still there to take.
        f.issuance
            .initialize(vec![IssuanceSegment {
                max_time: T0 + YEAR,
                offset_x: T0 - DAY,
                offset_y: 1_000_000 * SCALE,
                rate: 0,
            }])
            .unwrap();
        let event = settle(&mut f, &snapshot)
            .withdraw_rewards(&ctx, &owner(), TokenKind::Pollen)
            .unwrap();
        assert!(matches!(
            event,
            ProtocolEvent::WithdrawWithReward { reward, .. } if reward == 10 * SCALE
        ));
    }

    #[test]
    fn test_late_delegator_measured_from_own_entry() {
        let mut f = fixture();
        let bob = AccountId::from_label("bob");
        f.ledger.mint(TokenKind::Pollen, &bob, 100 * SCALE).unwrap();
        f.ledger
            .approve(TokenKind::Pollen, &bob, &AccountId::PORTFOLIO_CUSTODY, u128::MAX)
            .unwrap();

        // WETH and the benchmark both rise 50% before bob enters.
        let snapshot = prices(3_000);
        let bench = SCALE * 3 / 2;
        let market = MarketView {
            assets: &f.assets,
            prices: &snapshot,
            benchmark_value: bench,
        };
        f.book
            .delegate(
                &mut f.ledger,
                &CallContext::new(bob, T0 + DAY),
                &owner(),
                100 * SCALE,
                TokenKind::Pollen,
                &market,
                &limits(),
            )
            .unwrap();

        let now = T0 + DAY;
        let s = settle_at(&mut f, &snapshot, bench);
        let bob_quote = s.quote(&owner(), &bob, TokenKind::Pollen, 100 * SCALE, now).unwrap();
        assert_eq!(bob_quote.breakdown.net_return, Fixed::ZERO);
        assert_eq!(bob_quote.breakdown.portfolio_return, bob_quote.breakdown.benchmark_return);
        let owner_quote = s.quote(&owner(), &owner(), TokenKind::Pollen, 100 * SCALE, now).unwrap();
        assert_eq!(owner_quote.breakdown.portfolio_return, pct(50));
        assert_eq!(owner_quote.breakdown.benchmark_return, pct(50));
        assert_eq!(owner_quote.breakdown.net_return, Fixed::ZERO);
    }
}
