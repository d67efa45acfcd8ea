// crates/pollen-engine/src/lib.rs
//
// pollen-engine: atomic call execution for the Pollen Protocol.
//
// `Protocol` owns the mutable state, the external price source, and the admin
// authority. Every entrypoint runs against a draft copy of the state and
// commits it together with its buffered events only when the call succeeds.
// `Operation` is the serializable form of a call, used by hosts and by the CLI
// scenario runner.

pub mod dispatch;
pub mod protocol;
pub mod sink;
pub mod state;

pub use dispatch::Operation;
pub use protocol::{LimitsUpdate, Protocol, SingleAdmin};
pub use sink::TracingSink;
pub use state::{ProtocolState, ProtocolSummary};
