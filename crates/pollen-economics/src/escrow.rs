// crates/pollen-economics/src/escrow.rs
//
// Vote escrow: time-locked PLN, decaying voting power, and staking rewards.
//
// Locking PLN moves it into escrow custody and mints the same amount of
// non-transferable vePLN. Voting power decays linearly to zero at the lock's
// end; the vePLN balance does not decay.
//
// Staking rewards use a reward-per-stake accumulator. A constant emission
// `reward_rate` (base units per second) is shared pro-rata to locked amount:
//   acc_per_stake += rate * dt * SCALE / total_locked
// The accumulator and the account's checkpoint are always brought up to date
// with the *pre-mutation* stake before any stake or total changes.

use std::collections::BTreeMap;

use serde::Serialize;

use pollen_core::config::ProtocolConfig;
use pollen_core::error::PollenError;
use pollen_core::events::ProtocolEvent;
use pollen_core::identity::{AccountId, CallContext, TokenKind};
use pollen_core::math::{checked_add, checked_mul, checked_sub, mul_div, Fixed, SCALE};
use pollen_core::traits::TokenLedger;

/// A single account's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lock {
    pub owner: AccountId,
    /// Locked PLN in base units.
    pub amount: u128,
    /// Unix second at which the lock may be withdrawn.
    pub lock_end: u64,
}

impl Lock {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.lock_end
    }
}

/// Manages all locks and the staking reward stream.
#[derive(Debug, Clone)]
pub struct VoteEscrow {
    locks: BTreeMap<AccountId, Lock>,
    total_locked: u128,
    min_lock_period: u64,
    max_lock_period: u64,
    reward_rate: u128,
    acc_per_stake: u128,
    last_update: u64,
    paid_per_stake: BTreeMap<AccountId, u128>,
    accrued: BTreeMap<AccountId, u128>,
}

impl VoteEscrow {
    /// Create an empty escrow whose reward stream starts at `start`.
    pub fn new(min_lock_period: u64, max_lock_period: u64, reward_rate: u128, start: u64) -> Self {
        Self {
            locks: BTreeMap::new(),
            total_locked: 0,
            min_lock_period,
            max_lock_period,
            reward_rate,
            acc_per_stake: 0,
            last_update: start,
            paid_per_stake: BTreeMap::new(),
            accrued: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &ProtocolConfig, start: u64) -> Self {
        Self::new(
            config.min_lock_period,
            config.max_lock_period,
            config.reward_rate_units(),
            start,
        )
    }

    // -----------------------------------------------------------------------
    // Reward accumulator
    // -----------------------------------------------------------------------

    fn pending_acc(&self, now: u64) -> Result<u128, PollenError> {
        if now <= self.last_update || self.total_locked == 0 {
            return Ok(self.acc_per_stake);
        }
        let emitted = checked_mul(self.reward_rate, (now - self.last_update) as u128)?;
        checked_add(self.acc_per_stake, mul_div(emitted, SCALE, self.total_locked)?)
    }

    fn accumulate(&mut self, now: u64) -> Result<(), PollenError> {
        self.acc_per_stake = self.pending_acc(now)?;
        self.last_update = self.last_update.max(now);
        Ok(())
    }

    fn earned(&self, account: &AccountId, acc: u128) -> Result<u128, PollenError> {
        let stake = self.locks.get(account).map(|l| l.amount).unwrap_or(0);
        let paid = self.paid_per_stake.get(account).copied().unwrap_or(0);
        let fresh = mul_div(stake, checked_sub(acc, paid)?, SCALE)?;
        checked_add(self.accrued.get(account).copied().unwrap_or(0), fresh)
    }

    /// Bring the accumulator and `account`'s settled rewards up to `now`.
    /// Must run before any change to the account's stake or the total.
    fn checkpoint(&mut self, account: &AccountId, now: u64) -> Result<(), PollenError> {
        self.accumulate(now)?;
        let earned = self.earned(account, self.acc_per_stake)?;
        if earned > 0 {
            self.accrued.insert(*account, earned);
        }
        self.paid_per_stake.insert(*account, self.acc_per_stake);
        Ok(())
    }

    fn check_period(&self, lock_end: u64, now: u64) -> Result<(), PollenError> {
        let period = lock_end.saturating_sub(now);
        if lock_end <= now || period < self.min_lock_period || period > self.max_lock_period {
            return Err(PollenError::InvalidPeriod(format!(
                "lock period {}s outside [{}, {}]",
                period, self.min_lock_period, self.max_lock_period
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entrypoints
    // -----------------------------------------------------------------------

    /// Lock `amount` PLN until `lock_end`.
    ///
    /// # Errors
    /// `InvalidAmount` for zero, `LockActive` / `LockExpired` if the caller
    /// still has a lock, `InvalidPeriod` when the period is out of bounds, and
    /// any ledger failure from pulling the PLN.
    pub fn lock<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
        amount: u128,
        lock_end: u64,
    ) -> Result<ProtocolEvent, PollenError> {
        ctx.caller.ensure_nonzero()?;
        if amount == 0 {
            return Err(PollenError::InvalidAmount("lock amount must be positive".to_string()));
        }
        if let Some(existing) = self.locks.get(&ctx.caller) {
            return Err(if existing.is_expired(ctx.now) {
                PollenError::LockExpired
            } else {
                PollenError::LockActive
            });
        }
        self.check_period(lock_end, ctx.now)?;

        self.checkpoint(&ctx.caller, ctx.now)?;
        self.total_locked = checked_add(self.total_locked, amount)?;
        self.locks.insert(
            ctx.caller,
            Lock {
                owner: ctx.caller,
                amount,
                lock_end,
            },
        );

        ledger.transfer_from(
            TokenKind::Pollen,
            &AccountId::ESCROW_CUSTODY,
            &ctx.caller,
            &AccountId::ESCROW_CUSTODY,
            amount,
        )?;
        ledger.mint(TokenKind::VePollen, &ctx.caller, amount)?;

        tracing::debug!("Lock created for {}: {} until {}", ctx.caller, amount, lock_end);
        Ok(ProtocolEvent::LockCreated {
            account: ctx.caller,
            amount,
            lock_end,
        })
    }

    /// Add `amount` PLN to the caller's unexpired lock.
    pub fn increase_lock<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
        amount: u128,
    ) -> Result<ProtocolEvent, PollenError> {
        if amount == 0 {
            return Err(PollenError::InvalidAmount("increase must be positive".to_string()));
        }
        let lock = self.locks.get(&ctx.caller).ok_or(PollenError::NoLock)?;
        if lock.is_expired(ctx.now) {
            return Err(PollenError::LockExpired);
        }

        self.checkpoint(&ctx.caller, ctx.now)?;
        self.total_locked = checked_add(self.total_locked, amount)?;
        let lock = self.locks.get_mut(&ctx.caller).ok_or(PollenError::NoLock)?;
        lock.amount = checked_add(lock.amount, amount)?;
        let new_total = lock.amount;

        ledger.transfer_from(
            TokenKind::Pollen,
            &AccountId::ESCROW_CUSTODY,
            &ctx.caller,
            &AccountId::ESCROW_CUSTODY,
            amount,
        )?;
        ledger.mint(TokenKind::VePollen, &ctx.caller, amount)?;

        Ok(ProtocolEvent::LockIncreased {
            account: ctx.caller,
            amount,
            new_total,
        })
    }

    /// Push the caller's lock end out to `new_end`.
    pub fn extend_lock(&mut self, ctx: &CallContext, new_end: u64) -> Result<ProtocolEvent, PollenError> {
        let max_lock_period = self.max_lock_period;
        let lock = self
            .locks
            .get_mut(&ctx.caller)
            .filter(|l| l.amount > 0)
            .ok_or(PollenError::InvalidLock)?;
        if new_end <= lock.lock_end {
            return Err(PollenError::InvalidPeriod(format!(
                "new end {} is not after current end {}",
                new_end, lock.lock_end
            )));
        }
        if new_end.saturating_sub(ctx.now) > max_lock_period {
            return Err(PollenError::InvalidPeriod(format!(
                "new end {} is more than {}s away",
                new_end, max_lock_period
            )));
        }
        let old_end = lock.lock_end;
        lock.lock_end = new_end;

        Ok(ProtocolEvent::LockExtended {
            account: ctx.caller,
            old_end,
            new_end,
        })
    }

    /// Withdraw an expired lock. Accrued rewards stay claimable.
    pub fn unlock<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
    ) -> Result<ProtocolEvent, PollenError> {
        let lock = self
            .locks
            .get(&ctx.caller)
            .filter(|l| l.amount > 0)
            .ok_or(PollenError::InvalidLock)?;
        if !lock.is_expired(ctx.now) {
            return Err(PollenError::LockActive);
        }

        self.checkpoint(&ctx.caller, ctx.now)?;
        let lock = self.locks.remove(&ctx.caller).ok_or(PollenError::InvalidLock)?;
        self.total_locked = checked_sub(self.total_locked, lock.amount)?;

        ledger.burn(TokenKind::VePollen, &ctx.caller, lock.amount)?;
        ledger.transfer(
            TokenKind::Pollen,
            &AccountId::ESCROW_CUSTODY,
            &ctx.caller,
            lock.amount,
        )?;

        tracing::debug!("Unlocked {} for {}", lock.amount, ctx.caller);
        Ok(ProtocolEvent::UnLocked {
            account: ctx.caller,
            amount: lock.amount,
        })
    }

    /// Pay out everything the caller has earned so far.
    pub fn claim_rewards<L: TokenLedger>(
        &mut self,
        ledger: &mut L,
        ctx: &CallContext,
    ) -> Result<ProtocolEvent, PollenError> {
        self.checkpoint(&ctx.caller, ctx.now)?;
        let amount = self.accrued.remove(&ctx.caller).unwrap_or(0);

        if amount > 0 {
            ledger.transfer(
                TokenKind::Pollen,
                &AccountId::REWARD_RESERVE,
                &ctx.caller,
                amount,
            )?;
        }

        Ok(ProtocolEvent::RewardsClaimed {
            account: ctx.caller,
            amount,
        })
    }

    /// Change the emission rate. Emission up to `now` accrues at the old rate.
    pub fn set_reward_rate(&mut self, rate: u128, now: u64) -> Result<ProtocolEvent, PollenError> {
        self.accumulate(now)?;
        let old_rate = self.reward_rate;
        self.reward_rate = rate;
        Ok(ProtocolEvent::RewardRateSet {
            old_rate,
            new_rate: rate,
        })
    }

    /// Remove `amount` of `account`'s locked principal.
    ///
    /// Used by settlement when a vePLN-denominated deposit takes a loss: the
    /// burned vePLN must take the PLN backing it along, or the receipt supply
    /// would fall below `total_locked`. The caller burns the PLN from escrow
    /// custody.
    pub fn forfeit(&mut self, account: &AccountId, amount: u128, now: u64) -> Result<(), PollenError> {
        if amount == 0 {
            return Ok(());
        }
        let locked = self.locks.get(account).map(|l| l.amount).ok_or(PollenError::NoLock)?;
        if amount > locked {
            return Err(PollenError::InsufficientBalance {
                kind: TokenKind::VePollen,
                required: amount,
                available: locked,
            });
        }

        self.checkpoint(account, now)?;
        self.total_locked = checked_sub(self.total_locked, amount)?;
        if amount == locked {
            // Nothing left to unlock; free the slot for a new lock.
            self.locks.remove(account);
        } else if let Some(lock) = self.locks.get_mut(account) {
            lock.amount -= amount;
        }
        tracing::debug!("Forfeited {} of locked principal from {}", amount, account);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// `amount * max(0, lock_end - t) / max_lock_period`.
    pub fn voting_power(&self, account: &AccountId, t: u64) -> Result<u128, PollenError> {
        match self.locks.get(account) {
            Some(lock) => self.lock_power(lock, t),
            None => Ok(0),
        }
    }

    fn lock_power(&self, lock: &Lock, t: u64) -> Result<u128, PollenError> {
        let remaining = lock.lock_end.saturating_sub(t) as u128;
        mul_div(lock.amount, remaining, self.max_lock_period as u128)
    }

    /// Sum of every lock's voting power at `t`.
    pub fn total_voting_power(&self, t: u64) -> Result<u128, PollenError> {
        self.locks
            .values()
            .try_fold(0u128, |sum, lock| checked_add(sum, self.lock_power(lock, t)?))
    }

    /// `account`'s fraction of total voting power at `t` (zero if nobody votes).
    pub fn voting_power_share(&self, account: &AccountId, t: u64) -> Result<Fixed, PollenError> {
        let total = self.total_voting_power(t)?;
        if total == 0 {
            return Ok(Fixed::ZERO);
        }
        Fixed::from_ratio(self.voting_power(account, t)?, total)
    }

    /// Rewards `account` could claim at `now`, without mutating state.
    pub fn claimable_rewards(&self, account: &AccountId, now: u64) -> Result<u128, PollenError> {
        self.earned(account, self.pending_acc(now)?)
    }

    pub fn lock_of(&self, account: &AccountId) -> Option<&Lock> {
        self.locks.get(account)
    }

    pub fn locks(&self) -> impl Iterator<Item = &Lock> {
        self.locks.values()
    }

    pub fn total_locked(&self) -> u128 {
        self.total_locked
    }

    pub fn reward_rate(&self) -> u128 {
        self.reward_rate
    }

    pub fn acc_per_stake(&self) -> u128 {
        self.acc_per_stake
    }

    pub fn max_lock_period(&self) -> u64 {
        self.max_lock_period
    }
}
