// crates/pollen-economics/src/issuance.rs
//
// Piecewise-linear issuance schedule.
//
// The schedule bounds cumulative PLN minted through the settlement reward
// path. Each segment describes the curve
//   f(t) = rate * (t - offset_x) + offset_y
// up to its `max_time`. Segments are strictly ordered by `max_time` and the
// curve is continuous at every boundary. Past the last boundary the curve is
// flat at its final value.
//
// Boundary rule: the segment governing `t` is the first one whose
// `max_time > t`. At an exact boundary the next segment governs, which by
// continuity yields the same value.

use serde::{Deserialize, Serialize};

use pollen_core::error::PollenError;
use pollen_core::events::ProtocolEvent;
use pollen_core::math::{checked_add, checked_mul};

/// One linear piece of the issuance curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceSegment {
    /// End of this piece (unix seconds, exclusive).
    pub max_time: u64,
    /// Time origin of the line.
    pub offset_x: u64,
    /// Cumulative supply at `offset_x` (base units).
    pub offset_y: u128,
    /// Slope in base units per second.
    pub rate: u128,
}

impl IssuanceSegment {
    /// Evaluate this segment's line at `t`, clamped to `[offset_x, max_time]`.
    pub fn evaluate(&self, t: u64) -> Result<u128, PollenError> {
        let t = t.min(self.max_time);
        if t <= self.offset_x {
            return Ok(self.offset_y);
        }
        let elapsed = (t - self.offset_x) as u128;
        checked_add(checked_mul(self.rate, elapsed)?, self.offset_y)
    }
}

/// The issuance schedule plus the running total issued against it.
#[derive(Debug, Clone, Default)]
pub struct IssuanceSchedule {
    segments: Option<Vec<IssuanceSegment>>,
    issued: u128,
}

impl IssuanceSchedule {
    /// Create an uninitialized schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the schedule. May run exactly once.
    ///
    /// # Errors
    /// `AlreadyInitialized` on a second call; `InvalidSchedule` when the
    /// segments are empty, unordered, start before their line origin, or
    /// discontinuous.
    pub fn initialize(&mut self, segments: Vec<IssuanceSegment>) -> Result<ProtocolEvent, PollenError> {
        if self.segments.is_some() {
            return Err(PollenError::AlreadyInitialized("issuance schedule".to_string()));
        }
        validate_segments(&segments)?;

        let last = segments[segments.len() - 1];
        let event = ProtocolEvent::IssuanceScheduleSet {
            segments: segments.len(),
            final_time: last.max_time,
            final_supply: last.evaluate(last.max_time)?,
        };
        tracing::info!(
            "Issuance schedule set: {} segments ending at {}",
            segments.len(),
            last.max_time
        );
        self.segments = Some(segments);
        Ok(event)
    }

    pub fn is_initialized(&self) -> bool {
        self.segments.is_some()
    }

    pub fn segments(&self) -> &[IssuanceSegment] {
        self.segments.as_deref().unwrap_or(&[])
    }

    /// Total minted so far through `record_issuance`.
    pub fn issued(&self) -> u128 {
        self.issued
    }

    /// The segment governing time `t`.
    pub fn active_segment(&self, t: u64) -> Result<&IssuanceSegment, PollenError> {
        let segments = self
            .segments
            .as_deref()
            .ok_or_else(|| PollenError::NotInitialized("issuance schedule".to_string()))?;
        let index = segments.partition_point(|segment| segment.max_time <= t);
        Ok(&segments[index.min(segments.len() - 1)])
    }

    /// Cumulative supply ceiling at `t`.
    pub fn max_supply(&self, t: u64) -> Result<u128, PollenError> {
        self.active_segment(t)?.evaluate(t)
    }

    /// Headroom at `t` given an already-issued amount.
    pub fn max_allocation(&self, t: u64, already_issued: u128) -> Result<u128, PollenError> {
        Ok(self.max_supply(t)?.saturating_sub(already_issued))
    }

    /// Headroom at `t` against this schedule's own issued counter.
    /// Zero while the schedule is uninitialized: nothing may be minted.
    pub fn available(&self, t: u64) -> Result<u128, PollenError> {
        if !self.is_initialized() {
            return Ok(0);
        }
        self.max_allocation(t, self.issued)
    }

    /// Account for `amount` minted at `t`.
    ///
    /// # Errors
    /// `ExceedsIssuanceCap` if the mint would pass the curve.
    pub fn record_issuance(&mut self, amount: u128, t: u64) -> Result<(), PollenError> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.available(t)?;
        if amount > available {
            return Err(PollenError::ExceedsIssuanceCap {
                requested: amount,
                available,
            });
        }
        self.issued = checked_add(self.issued, amount)?;
        Ok(())
    }
}

fn validate_segments(segments: &[IssuanceSegment]) -> Result<(), PollenError> {
    if segments.is_empty() {
        return Err(PollenError::InvalidSchedule("no segments".to_string()));
    }
    if segments[0].max_time <= segments[0].offset_x {
        return Err(PollenError::InvalidSchedule(
            "first segment ends before its origin".to_string(),
        ));
    }
    for (i, pair) in segments.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);
        if next.max_time <= prev.max_time {
            return Err(PollenError::InvalidSchedule(format!(
                "segment {} max_time {} is not after {}",
                i + 1,
                next.max_time,
                prev.max_time
            )));
        }
        if next.offset_x > prev.max_time {
            return Err(PollenError::InvalidSchedule(format!(
                "segment {} origin {} is after its start {}",
                i + 1,
                next.offset_x,
                prev.max_time
            )));
        }
        let left = prev.evaluate(prev.max_time)?;
        let right = next.evaluate(prev.max_time)?;
        if left != right {
            return Err(PollenError::InvalidSchedule(format!(
                "discontinuity at {}: {} != {}",
                prev.max_time, left, right
            )));
        }
    }
    // The final value must be representable.
    let last = segments[segments.len() - 1];
    last.evaluate(last.max_time)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0..100: slope 10 from 0; 100..200: slope 5 from (100, 1000); 200..300 flat.
    fn three_segments() -> Vec<IssuanceSegment> {
        vec![
            IssuanceSegment {
                max_time: 100,
                offset_x: 0,
                offset_y: 0,
                rate: 10,
            },
            IssuanceSegment {
                max_time: 200,
                offset_x: 100,
                offset_y: 1_000,
                rate: 5,
            },
            IssuanceSegment {
                max_time: 300,
                offset_x: 200,
                offset_y: 1_500,
                rate: 0,
            },
        ]
    }

    fn initialized() -> IssuanceSchedule {
        let mut schedule = IssuanceSchedule::new();
        schedule.initialize(three_segments()).unwrap();
        schedule
    }

    #[test]
    fn test_initialize_once() {
        let mut schedule = initialized();
        assert_eq!(
            schedule.initialize(three_segments()),
            Err(PollenError::AlreadyInitialized("issuance schedule".to_string()))
        );
    }

    #[test]
    fn test_initialize_event() {
        let mut schedule = IssuanceSchedule::new();
        let event = schedule.initialize(three_segments()).unwrap();
        assert_eq!(
            event,
            ProtocolEvent::IssuanceScheduleSet {
                segments: 3,
                final_time: 300,
                final_supply: 1_500
            }
        );
    }

    #[test]
    fn test_rejects_unordered() {
        let mut segments = three_segments();
        segments[2].max_time = 150;
        let mut schedule = IssuanceSchedule::new();
        assert!(matches!(
            schedule.initialize(segments),
            Err(PollenError::InvalidSchedule(_))
        ));
        assert!(!schedule.is_initialized());
    }

    #[test]
    fn test_rejects_discontinuity() {
        let mut segments = three_segments();
        segments[1].offset_y = 999;
        let mut schedule = IssuanceSchedule::new();
        assert!(matches!(
            schedule.initialize(segments),
            Err(PollenError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn test_rejects_empty() {
        let mut schedule = IssuanceSchedule::new();
        assert!(schedule.initialize(Vec::new()).is_err());
    }

    #[test]
    fn test_active_segment_boundary_rule() {
        let schedule = initialized();
        assert_eq!(schedule.active_segment(0).unwrap().max_time, 100);
        assert_eq!(schedule.active_segment(99).unwrap().max_time, 100);
        // At an exact boundary the next segment governs.
        assert_eq!(schedule.active_segment(100).unwrap().max_time, 200);
        assert_eq!(schedule.active_segment(299).unwrap().max_time, 300);
        // Past the end the last segment governs.
        assert_eq!(schedule.active_segment(10_000).unwrap().max_time, 300);
    }

    #[test]
    fn test_max_supply_is_continuous_at_boundaries() {
        let schedule = initialized();
        assert_eq!(schedule.max_supply(99).unwrap(), 990);
        assert_eq!(schedule.max_supply(100).unwrap(), 1_000);
        assert_eq!(schedule.max_supply(150).unwrap(), 1_250);
        assert_eq!(schedule.max_supply(200).unwrap(), 1_500);
        assert_eq!(schedule.max_supply(5_000).unwrap(), 1_500);
    }

    #[test]
    fn test_max_allocation_subtracts_issued() {
        let schedule = initialized();
        assert_eq!(schedule.max_allocation(150, 250).unwrap(), 1_000);
        assert_eq!(schedule.max_allocation(10, 500).unwrap(), 0);
    }

    #[test]
    fn test_record_issuance_enforces_cap() {
        let mut schedule = initialized();
        schedule.record_issuance(900, 100).unwrap();
        assert_eq!(schedule.available(100).unwrap(), 100);
        assert_eq!(
            schedule.record_issuance(101, 100),
            Err(PollenError::ExceedsIssuanceCap {
                requested: 101,
                available: 100
            })
        );
        assert_eq!(schedule.issued(), 900);
    }

    #[test]
    fn test_uninitialized_schedule_has_no_headroom() {
        let mut schedule = IssuanceSchedule::new();
        assert_eq!(schedule.available(1_000).unwrap(), 0);
        assert!(schedule.max_supply(1_000).is_err());
        assert!(schedule.record_issuance(1, 1_000).is_err());
        assert!(schedule.record_issuance(0, 1_000).is_ok());
    }
}
