// crates/pollen-core/src/identity.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::PollenError;

/// Index of an asset in the configured whitelist. Index 0 is the cash leg.
pub type AssetId = usize;

/// The cash leg of every portfolio.
pub const CASH_ASSET: AssetId = 0;

/// A 32-byte account identity.
///
/// Serialized as a `0x`-prefixed hex string. When parsing, any string without
/// the `0x` prefix is treated as a label and hashed into an id, so scenario
/// files can say `"alice"` instead of spelling out 64 hex digits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// The zero account. Never a valid caller or counterparty.
    pub const ZERO: AccountId = AccountId([0u8; 32]);

    /// Custody of locked PLN principal.
    pub const ESCROW_CUSTODY: AccountId = AccountId([0xE5; 32]);

    /// Custody of principal delegated into portfolios.
    pub const PORTFOLIO_CUSTODY: AccountId = AccountId([0xC0; 32]);

    /// Reserve that staking rewards are paid out of.
    pub const REWARD_RESERVE: AccountId = AccountId([0xEE; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an id from a human-readable label (SHA-256 of the label).
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parse a `0x`-prefixed, 64-digit hex id.
    pub fn from_hex(s: &str) -> Result<Self, PollenError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits)
            .map_err(|e| PollenError::Serialization(format!("invalid account hex: {}", e)))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|v: Vec<u8>| {
            PollenError::Serialization(format!("account id must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Whether this is one of the protocol's own custody accounts.
    pub fn is_system(&self) -> bool {
        *self == Self::ESCROW_CUSTODY
            || *self == Self::PORTFOLIO_CUSTODY
            || *self == Self::REWARD_RESERVE
    }

    /// Reject the zero account.
    pub fn ensure_nonzero(&self) -> Result<(), PollenError> {
        if self.is_zero() {
            return Err(PollenError::ZeroAddress);
        }
        Ok(())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form: first 4 bytes are enough to tell accounts apart in logs.
        write!(f, "0x{}…", hex::encode(&self.0[..4]))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

impl FromStr for AccountId {
    type Err = PollenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") {
            Self::from_hex(s)
        } else {
            Ok(Self::from_label(s))
        }
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The two token kinds the protocol accounts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// PLN, the principal governance token.
    Pollen,
    /// vePLN, the non-transferable escrow receipt minted 1:1 against locked PLN.
    VePollen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Pollen => write!(f, "PLN"),
            TokenKind::VePollen => write!(f, "vePLN"),
        }
    }
}

/// Per-call execution context supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The account invoking the entrypoint.
    pub caller: AccountId,
    /// Host timestamp in unix seconds.
    pub now: u64,
}

impl CallContext {
    pub fn new(caller: AccountId, now: u64) -> Self {
        Self { caller, now }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let id = AccountId::new([7u8; 32]);
        let parsed = AccountId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_label_is_stable_and_distinct() {
        assert_eq!(AccountId::from_label("alice"), AccountId::from_label("alice"));
        assert_ne!(AccountId::from_label("alice"), AccountId::from_label("bob"));
        assert!(!AccountId::from_label("alice").is_zero());
    }

    #[test]
    fn test_parse_prefers_hex_with_prefix() {
        let hex = format!("0x{}", "11".repeat(32));
        let id: AccountId = hex.parse().unwrap();
        assert_eq!(id, AccountId::new([0x11; 32]));
        assert!("0x1234".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id = AccountId::new([1u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "01".repeat(32)));
        let back: AccountId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(back, AccountId::from_label("alice"));
    }

    #[test]
    fn test_system_accounts() {
        assert!(AccountId::ESCROW_CUSTODY.is_system());
        assert!(!AccountId::new([1u8; 32]).is_system());
        assert_eq!(AccountId::ZERO.ensure_nonzero(), Err(PollenError::ZeroAddress));
    }
}
