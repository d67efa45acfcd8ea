// crates/pollen-engine/src/dispatch.rs
//
// Operation dispatch table.
//
// `Operation` names every public entrypoint with its arguments. A host or a
// scenario file submits operations; `Protocol::execute` resolves each tag to
// its implementation through a single match. Adding an entrypoint means adding
// a variant and an arm here.

use serde::{Deserialize, Serialize};

use pollen_core::error::PollenError;
use pollen_core::events::ProtocolEvent;
use pollen_core::identity::{AccountId, CallContext, TokenKind};
use pollen_core::traits::{AdminAuthority, PriceSource};
use pollen_economics::issuance::IssuanceSegment;

use crate::protocol::{LimitsUpdate, Protocol};

fn default_kind() -> TokenKind {
    TokenKind::Pollen
}

/// A call to one protocol entrypoint.
///
/// Serialized externally tagged, e.g. `{"lock": {"amount": ..., "lock_end": ...}}`.
/// `is_short` may be omitted for an all-long allocation and `kind` defaults
/// to PLN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Lock {
        amount: u128,
        lock_end: u64,
    },
    IncreaseLock {
        amount: u128,
    },
    ExtendLock {
        new_end: u64,
    },
    Unlock,
    ClaimRewards,
    Approve {
        #[serde(default = "default_kind")]
        kind: TokenKind,
        spender: AccountId,
        amount: u128,
    },
    Transfer {
        #[serde(default = "default_kind")]
        kind: TokenKind,
        to: AccountId,
        amount: u128,
    },
    InitializeIssuance {
        segments: Vec<IssuanceSegment>,
    },
    CreateBenchmark {
        weights: Vec<u8>,
    },
    SetRewardRate {
        rate: u128,
    },
    UpdateLimits {
        min_portfolio_deposit: u64,
        max_portfolio_balance: u64,
        max_delegation_operations: usize,
        price_max_age: u64,
    },
    CreatePortfolio {
        weights: Vec<u8>,
        #[serde(default)]
        is_short: Vec<bool>,
        amount: u128,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    RebalancePortfolio {
        weights: Vec<u8>,
        #[serde(default)]
        is_short: Vec<bool>,
        #[serde(default)]
        add_amount: u128,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    DelegatePollen {
        owner: AccountId,
        amount: u128,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    MultiDelegatePollen {
        owners: Vec<AccountId>,
        amounts: Vec<u128>,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    Withdraw {
        owner: AccountId,
        amount: u128,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    WithdrawRewards {
        owner: AccountId,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    WithdrawMany {
        owners: Vec<AccountId>,
        amounts: Vec<u128>,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
    WithdrawRewardsMany {
        owners: Vec<AccountId>,
        #[serde(default = "default_kind")]
        kind: TokenKind,
    },
}

impl Operation {
    /// Entrypoint name, for logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Lock { .. } => "lock",
            Operation::IncreaseLock { .. } => "increase_lock",
            Operation::ExtendLock { .. } => "extend_lock",
            Operation::Unlock => "unlock",
            Operation::ClaimRewards => "claim_rewards",
            Operation::Approve { .. } => "approve",
            Operation::Transfer { .. } => "transfer",
            Operation::InitializeIssuance { .. } => "initialize_issuance",
            Operation::CreateBenchmark { .. } => "create_benchmark",
            Operation::SetRewardRate { .. } => "set_reward_rate",
            Operation::UpdateLimits { .. } => "update_limits",
            Operation::CreatePortfolio { .. } => "create_portfolio",
            Operation::RebalancePortfolio { .. } => "rebalance_portfolio",
            Operation::DelegatePollen { .. } => "delegate_pollen",
            Operation::MultiDelegatePollen { .. } => "multi_delegate_pollen",
            Operation::Withdraw { .. } => "withdraw",
            Operation::WithdrawRewards { .. } => "withdraw_rewards",
            Operation::WithdrawMany { .. } => "withdraw_many",
            Operation::WithdrawRewardsMany { .. } => "withdraw_rewards_many",
        }
    }
}

/// An omitted short mask means every leg is long.
fn short_mask(weights: &[u8], is_short: Vec<bool>) -> Vec<bool> {
    if is_short.is_empty() {
        vec![false; weights.len()]
    } else {
        is_short
    }
}

impl<P: PriceSource, A: AdminAuthority> Protocol<P, A> {
    /// Execute one operation on behalf of `ctx.caller` at `ctx.now`.
    pub fn execute(
        &mut self,
        ctx: &CallContext,
        operation: Operation,
    ) -> Result<Vec<ProtocolEvent>, PollenError> {
        match operation {
            Operation::Lock { amount, lock_end } => self.lock(ctx, amount, lock_end),
            Operation::IncreaseLock { amount } => self.increase_lock(ctx, amount),
            Operation::ExtendLock { new_end } => self.extend_lock(ctx, new_end),
            Operation::Unlock => self.unlock(ctx),
            Operation::ClaimRewards => self.claim_rewards(ctx),
            Operation::Approve {
                kind,
                spender,
                amount,
            } => self.approve(ctx, kind, &spender, amount),
            Operation::Transfer { kind, to, amount } => self.transfer(ctx, kind, &to, amount),
            Operation::InitializeIssuance { segments } => self.initialize_issuance(ctx, segments),
            Operation::CreateBenchmark { weights } => self.create_benchmark(ctx, weights),
            Operation::SetRewardRate { rate } => self.set_reward_rate(ctx, rate),
            Operation::UpdateLimits {
                min_portfolio_deposit,
                max_portfolio_balance,
                max_delegation_operations,
                price_max_age,
            } => self.update_limits(
                ctx,
                LimitsUpdate {
                    min_portfolio_deposit,
                    max_portfolio_balance,
                    max_delegation_operations,
                    price_max_age,
                },
            ),
            Operation::CreatePortfolio {
                weights,
                is_short,
                amount,
                kind,
            } => {
                let is_short = short_mask(&weights, is_short);
                self.create_portfolio(ctx, weights, is_short, amount, kind)
            }
            Operation::RebalancePortfolio {
                weights,
                is_short,
                add_amount,
                kind,
            } => {
                let is_short = short_mask(&weights, is_short);
                self.rebalance_portfolio(ctx, weights, is_short, add_amount, kind)
            }
            Operation::DelegatePollen {
                owner,
                amount,
                kind,
            } => self.delegate_pollen(ctx, &owner, amount, kind),
            Operation::MultiDelegatePollen {
                owners,
                amounts,
                kind,
            } => self.multi_delegate_pollen(ctx, &owners, &amounts, kind),
            Operation::Withdraw {
                owner,
                amount,
                kind,
            } => self.withdraw(ctx, &owner, amount, kind),
            Operation::WithdrawRewards { owner, kind } => self.withdraw_rewards(ctx, &owner, kind),
            Operation::WithdrawMany {
                owners,
                amounts,
                kind,
            } => self.withdraw_many(ctx, &owners, &amounts, kind),
            Operation::WithdrawRewardsMany { owners, kind } => {
                self.withdraw_rewards_many(ctx, &owners, kind)
            }
        }
    }
}
