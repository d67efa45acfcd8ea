// crates/pollen-core/src/lib.rs
//
// pollen-core: Core types, traits, and fixed-point math for the Pollen Protocol.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines identities, the error taxonomy, the collaborator seams (price
// source, token ledger, admin authority, event sinks), the audit event stream,
// and the protocol configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod math;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use pollen_core::PollenError;`

pub use config::{AssetConfig, ProtocolConfig, DAY, YEAR};
pub use error::{ErrorKind, PollenError};
pub use events::{EventLog, EventRecord, ProtocolEvent};
pub use identity::{AccountId, AssetId, CallContext, TokenKind, CASH_ASSET};
pub use math::{mul_div, Fixed, BPS_DENOMINATOR, SCALE};
pub use traits::{AdminAuthority, EventSink, PriceSource, Quote, TokenLedger};
