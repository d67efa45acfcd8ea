// crates/pollen-core/src/traits.rs
//
// Seams to the external collaborators the accounting core talks to.
// Implementations live in pollen-economics (in-memory) or in a host.

use serde::{Deserialize, Serialize};

use crate::error::PollenError;
use crate::events::EventRecord;
use crate::identity::{AccountId, AssetId, TokenKind};

/// A single oracle reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Price of one unit of the asset in the cash asset, 1e18 fixed point.
    pub rate: u128,
    /// When the reading was taken (unix seconds).
    pub updated_at: u64,
}

/// Price oracle.
///
/// Staleness is judged by the caller against its configured maximum age.
pub trait PriceSource {
    fn quote(&self, asset: AssetId) -> Result<Quote, PollenError>;
}

/// Fungible token surface for PLN and vePLN.
///
/// Implementations report their own failures (`InsufficientBalance`,
/// `InsufficientAllowance`, `NonTransferable`); the core propagates them
/// unchanged.
pub trait TokenLedger {
    fn balance_of(&self, kind: TokenKind, account: &AccountId) -> u128;

    fn total_supply(&self, kind: TokenKind) -> u128;

    fn allowance(&self, kind: TokenKind, owner: &AccountId, spender: &AccountId) -> u128;

    fn approve(
        &mut self,
        kind: TokenKind,
        owner: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) -> Result<(), PollenError>;

    fn transfer(
        &mut self,
        kind: TokenKind,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PollenError>;

    /// Move `amount` from `from` to `to` on the authority of `spender`'s allowance.
    fn transfer_from(
        &mut self,
        kind: TokenKind,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PollenError>;

    fn mint(&mut self, kind: TokenKind, to: &AccountId, amount: u128) -> Result<(), PollenError>;

    fn burn(&mut self, kind: TokenKind, from: &AccountId, amount: u128) -> Result<(), PollenError>;
}

/// Capability check for admin-gated entrypoints.
///
/// A single admin today; a governance executor can implement this later and
/// call the same entrypoints.
pub trait AdminAuthority {
    fn is_admin(&self, account: &AccountId) -> bool;
}

/// Publish hook for the audit event stream.
pub trait EventSink: Send {
    fn publish(&mut self, record: &EventRecord);
}
