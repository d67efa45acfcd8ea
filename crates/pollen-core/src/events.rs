// crates/pollen-core/src/events.rs
//
// Audit event stream.
//
// Events are the only off-chain-visible channel. Each call buffers its events
// and the engine publishes them here only after the call commits, so a failed
// call never leaves a trace in the log. Sinks are publish hooks that can be
// swapped for a real message bus.

use serde::Serialize;

use crate::identity::{AccountId, TokenKind};
use crate::math::Fixed;
use crate::traits::EventSink;

/// Events emitted by the accounting modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum ProtocolEvent {
    LockCreated {
        account: AccountId,
        amount: u128,
        lock_end: u64,
    },
    LockIncreased {
        account: AccountId,
        amount: u128,
        new_total: u128,
    },
    LockExtended {
        account: AccountId,
        old_end: u64,
        new_end: u64,
    },
    UnLocked {
        account: AccountId,
        amount: u128,
    },
    RewardsClaimed {
        account: AccountId,
        amount: u128,
    },
    RewardRateSet {
        old_rate: u128,
        new_rate: u128,
    },
    IssuanceScheduleSet {
        segments: usize,
        final_time: u64,
        final_supply: u128,
    },
    BenchmarkPortfolioCreated {
        weights: Vec<u8>,
    },
    PortfolioCreated {
        owner: AccountId,
        amount: u128,
        kind: TokenKind,
        weights: Vec<u8>,
        is_short: Vec<bool>,
        benchmark_ref: u128,
    },
    PortfolioRebalanced {
        owner: AccountId,
        weights: Vec<u8>,
        is_short: Vec<bool>,
        value: u128,
        added: u128,
        kind: TokenKind,
        benchmark_ref: u128,
    },
    PortfolioClosed {
        owner: AccountId,
        value: u128,
    },
    Delegated {
        delegator: AccountId,
        owner: AccountId,
        amount: u128,
        kind: TokenKind,
        benchmark_ref: u128,
    },
    WithdrawWithReward {
        owner: AccountId,
        withdrawer: AccountId,
        kind: TokenKind,
        principal: u128,
        reward: u128,
        owner_fee: u128,
        boosted_return: Fixed,
    },
    WithdrawWithPenalty {
        owner: AccountId,
        withdrawer: AccountId,
        kind: TokenKind,
        returned: u128,
        burned: u128,
        boosted_return: Fixed,
    },
    LimitsUpdated {
        min_portfolio_deposit: u128,
        max_portfolio_balance: u128,
        max_delegation_operations: usize,
        price_max_age: u64,
    },
}

impl ProtocolEvent {
    /// Variant name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolEvent::LockCreated { .. } => "LockCreated",
            ProtocolEvent::LockIncreased { .. } => "LockIncreased",
            ProtocolEvent::LockExtended { .. } => "LockExtended",
            ProtocolEvent::UnLocked { .. } => "UnLocked",
            ProtocolEvent::RewardsClaimed { .. } => "RewardsClaimed",
            ProtocolEvent::RewardRateSet { .. } => "RewardRateSet",
            ProtocolEvent::IssuanceScheduleSet { .. } => "IssuanceScheduleSet",
            ProtocolEvent::BenchmarkPortfolioCreated { .. } => "BenchmarkPortfolioCreated",
            ProtocolEvent::PortfolioCreated { .. } => "PortfolioCreated",
            ProtocolEvent::PortfolioRebalanced { .. } => "PortfolioRebalanced",
            ProtocolEvent::PortfolioClosed { .. } => "PortfolioClosed",
            ProtocolEvent::Delegated { .. } => "Delegated",
            ProtocolEvent::WithdrawWithReward { .. } => "WithdrawWithReward",
            ProtocolEvent::WithdrawWithPenalty { .. } => "WithdrawWithPenalty",
            ProtocolEvent::LimitsUpdated { .. } => "LimitsUpdated",
        }
    }
}

/// An event as it appears in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Monotonic position in the log, starting at 0.
    pub sequence: u64,
    /// Timestamp of the call that produced the event.
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: ProtocolEvent,
}

/// Append-only in-memory event log with publish hooks.
#[derive(Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a publish hook. It sees every record appended afterwards.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Append the events of one committed call.
    pub fn append(&mut self, timestamp: u64, events: Vec<ProtocolEvent>) {
        for event in events {
            let record = EventRecord {
                sequence: self.records.len() as u64,
                timestamp,
                event,
            };
            for sink in self.sinks.iter_mut() {
                sink.publish(&record);
            }
            self.records.push(record);
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= from`.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = (from as usize).min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Collect(Arc<Mutex<Vec<u64>>>);

    impl EventSink for Collect {
        fn publish(&mut self, record: &EventRecord) {
            self.0.lock().unwrap().push(record.sequence);
        }
    }

    fn unlocked(amount: u128) -> ProtocolEvent {
        ProtocolEvent::UnLocked {
            account: AccountId::new([1u8; 32]),
            amount,
        }
    }

    #[test]
    fn test_append_assigns_sequence_and_timestamp() {
        let mut log = EventLog::new();
        log.append(100, vec![unlocked(1), unlocked(2)]);
        log.append(200, vec![unlocked(3)]);

        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[2].sequence, 2);
        assert_eq!(log.records()[2].timestamp, 200);
        assert_eq!(log.since(1).len(), 2);
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn test_sinks_see_every_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut log = EventLog::new();
        log.add_sink(Box::new(Collect(seen.clone())));
        log.append(1, vec![unlocked(1), unlocked(2)]);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_record_serializes_flat() {
        let record = EventRecord {
            sequence: 0,
            timestamp: 5,
            event: unlocked(7),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "UnLocked");
        assert_eq!(json["timestamp"], 5);
        assert_eq!(json["amount"], 7);
    }
}
