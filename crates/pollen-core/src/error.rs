// crates/pollen-core/src/error.rs

use thiserror::Error;

use crate::identity::TokenKind;

/// Broad classification of a failure, so callers can branch on cause
/// without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any mutation.
    Validation,
    /// Wrong lifecycle state for the requested operation.
    State,
    /// Insufficient funds, stale data, or a configured ceiling exceeded.
    Resource,
    /// Caller lacks the capability required by the entrypoint.
    Authorization,
    /// Fixed-point overflow or division by zero.
    Arithmetic,
    /// Configuration or serialization failure outside a protocol call.
    Io,
}

/// Protocol-wide error types for the Pollen Protocol.
///
/// Every error aborts the whole call; no partial mutation survives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollenError {
    /// Amount is zero or otherwise unusable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The zero account was supplied where a real account is required.
    #[error("Zero address")]
    ZeroAddress,

    /// Two parallel inputs have different lengths.
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Portfolio weights are malformed.
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    /// Lock end is outside the permitted window.
    #[error("Invalid lock period: {0}")]
    InvalidPeriod(String),

    /// Issuance segments are unordered or discontinuous.
    #[error("Invalid issuance schedule: {0}")]
    InvalidSchedule(String),

    /// A non-zero weight was assigned to a delisted asset.
    #[error("Asset {0} is delisted")]
    AssetDelisted(usize),

    /// Deposit is below the configured floor.
    #[error("Deposit {amount} is below the minimum of {minimum}")]
    BelowMinimumDeposit { amount: u128, minimum: u128 },

    /// Caller has no lock.
    #[error("No lock found")]
    NoLock,

    /// Lock is missing or empty.
    #[error("Invalid lock")]
    InvalidLock,

    /// Lock has not reached its end time.
    #[error("Lock is still active")]
    LockActive,

    /// Lock end time has passed.
    #[error("Lock has expired")]
    LockExpired,

    /// A one-time initialization already ran.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    /// A required one-time initialization has not run yet.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Caller already owns a portfolio.
    #[error("Portfolio already initialized")]
    PortfolioAlreadyInitialized,

    /// No portfolio is registered for the owner.
    #[error("Portfolio not found")]
    PortfolioNotFound,

    /// Portfolio is closed to new deposits.
    #[error("Portfolio is closed")]
    PortfolioClosed,

    /// Portfolio holdings are worth nothing; shares cannot be priced.
    #[error("Portfolio value is zero")]
    ZeroPortfolioValue,

    /// Reward withdrawal requested while the boosted return is negative.
    #[error("No positive return to withdraw")]
    NoPositiveReturn,

    /// Withdrawal exceeds the depositor's principal of that kind.
    #[error("Insufficient deposit: requested {requested}, available {available}")]
    InsufficientDeposit { requested: u128, available: u128 },

    /// Token ledger balance too low.
    #[error("Insufficient {kind} balance: required {required}, available {available}")]
    InsufficientBalance {
        kind: TokenKind,
        required: u128,
        available: u128,
    },

    /// Token ledger allowance too low.
    #[error("Insufficient {kind} allowance: required {required}, available {available}")]
    InsufficientAllowance {
        kind: TokenKind,
        required: u128,
        available: u128,
    },

    /// vePLN may only move between an account and protocol custody.
    #[error("Escrow receipts are non-transferable")]
    NonTransferable,

    /// A price quote is older than the configured maximum age.
    #[error("Stale price feed for asset {asset}: age {age}s exceeds {max_age}s")]
    StalePriceFeed { asset: usize, age: u64, max_age: u64 },

    /// The price source has no quote for the asset.
    #[error("No price available for asset {0}")]
    PriceUnavailable(usize),

    /// Deposit would push the portfolio over its ceiling.
    #[error("Portfolio balance {balance} would exceed the maximum of {maximum}")]
    ExceedsMaxPortfolioBalance { balance: u128, maximum: u128 },

    /// Batch is larger than the configured cap.
    #[error("Batch of {requested} operations exceeds the maximum of {maximum}")]
    ExceedsMaxOperations { requested: usize, maximum: usize },

    /// Mint would exceed the issuance schedule.
    #[error("Issuance of {requested} exceeds available allocation {available}")]
    ExceedsIssuanceCap { requested: u128, available: u128 },

    /// Caller is not permitted to run the entrypoint.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Fixed-point overflow or division by zero.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PollenError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollenError::InvalidAmount(_)
            | PollenError::ZeroAddress
            | PollenError::LengthMismatch { .. }
            | PollenError::InvalidWeights(_)
            | PollenError::InvalidPeriod(_)
            | PollenError::InvalidSchedule(_)
            | PollenError::AssetDelisted(_)
            | PollenError::BelowMinimumDeposit { .. } => ErrorKind::Validation,

            PollenError::NoLock
            | PollenError::InvalidLock
            | PollenError::LockActive
            | PollenError::LockExpired
            | PollenError::AlreadyInitialized(_)
            | PollenError::NotInitialized(_)
            | PollenError::PortfolioAlreadyInitialized
            | PollenError::PortfolioNotFound
            | PollenError::PortfolioClosed
            | PollenError::ZeroPortfolioValue
            | PollenError::NoPositiveReturn
            | PollenError::InsufficientDeposit { .. } => ErrorKind::State,

            PollenError::InsufficientBalance { .. }
            | PollenError::InsufficientAllowance { .. }
            | PollenError::NonTransferable
            | PollenError::StalePriceFeed { .. }
            | PollenError::PriceUnavailable(_)
            | PollenError::ExceedsMaxPortfolioBalance { .. }
            | PollenError::ExceedsMaxOperations { .. }
            | PollenError::ExceedsIssuanceCap { .. } => ErrorKind::Resource,

            PollenError::Unauthorized(_) => ErrorKind::Authorization,
            PollenError::ArithmeticOverflow => ErrorKind::Arithmetic,
            PollenError::Config(_) | PollenError::Serialization(_) => ErrorKind::Io,
        }
    }
}

impl From<serde_json::Error> for PollenError {
    fn from(e: serde_json::Error) -> Self {
        PollenError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PollenError {
    fn from(e: toml::de::Error) -> Self {
        PollenError::Config(e.to_string())
    }
}
