//! Bounded per-AWB history.
//!
//! The policy is pure: given the live records for one AWB it says which of
//! them have to go before one more record may be added. The ledger applies
//! the decision inside the same transaction as the insert.

use crate::error::{Error, Result};
use crate::record::RcaRecord;

/// Default cap on live remarks per AWB.
pub const DEFAULT_MAX_REMARKS_PER_AWB: usize = 10;

/// Fixed-capacity eviction over the remarks of a single AWB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    max_per_awb: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_per_awb: DEFAULT_MAX_REMARKS_PER_AWB,
        }
    }
}

impl EvictionPolicy {
    /// Create a policy with the given cap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] if `max_per_awb` is zero.
    pub fn new(max_per_awb: usize) -> Result<Self> {
        if max_per_awb == 0 {
            return Err(Error::ConfigValidation {
                message: "max_remarks_per_awb must be greater than 0".to_string(),
            });
        }
        Ok(Self { max_per_awb })
    }

    /// The configured cap.
    #[must_use]
    pub fn max_per_awb(&self) -> usize {
        self.max_per_awb
    }

    /// Pick the records to evict before appending one more to `existing`.
    ///
    /// `existing` must be the live records of a single AWB, each carrying its
    /// storage id. Victims are ordered oldest first: smallest `updated_on`,
    /// ties by smallest id. With the invariant intact this is never more than
    /// one record; a cap lowered since the records were written yields as
    /// many as needed to leave room for the insert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityEviction`] if more victims are needed than
    /// there are records.
    pub fn select_victims<'a>(
        &self,
        awb: &str,
        existing: &'a [RcaRecord],
    ) -> Result<Vec<&'a RcaRecord>> {
        let live = existing.len();
        if live < self.max_per_awb {
            return Ok(Vec::new());
        }

        let needed = live + 1 - self.max_per_awb;
        if needed > live {
            return Err(Error::CapacityEviction {
                awb: awb.to_string(),
                live,
                max: self.max_per_awb,
            });
        }

        let mut ordered: Vec<&RcaRecord> = existing.iter().collect();
        ordered.sort_by_key(|r| (r.updated_on, r.id.unwrap_or(i64::MAX)));
        ordered.truncate(needed);
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RcaType;
    use chrono::{Duration, TimeZone, Utc};

    fn records(n: usize) -> Vec<RcaRecord> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let mut r = RcaRecord::new("AWB1", "SC", RcaType::Pendency, "", format!("r{i}"))
                    .at(base + Duration::minutes(i as i64));
                r.id = Some(i as i64 + 1);
                r
            })
            .collect()
    }

    #[test]
    fn test_zero_cap_rejected() {
        assert!(matches!(
            EvictionPolicy::new(0),
            Err(Error::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_default_cap() {
        assert_eq!(EvictionPolicy::default().max_per_awb(), 10);
    }

    #[test]
    fn test_no_eviction_below_capacity() {
        let policy = EvictionPolicy::default();
        for n in 0..10 {
            assert!(policy.select_victims("AWB1", &records(n)).unwrap().is_empty());
        }
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let policy = EvictionPolicy::default();
        let mut existing = records(10);
        existing.reverse();
        let victims = policy.select_victims("AWB1", &existing).unwrap();
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].remark, "r0");
    }

    #[test]
    fn test_tie_broken_by_insertion_order() {
        let policy = EvictionPolicy::new(3).unwrap();
        let mut existing = records(3);
        let same = existing[0].updated_on + Duration::hours(1);
        for r in &mut existing {
            r.updated_on = same;
        }
        existing.swap(0, 2);
        let victims = policy.select_victims("AWB1", &existing).unwrap();
        assert_eq!(victims[0].id, Some(1));
    }

    #[test]
    fn test_timestamp_beats_insertion_order() {
        let policy = EvictionPolicy::new(2).unwrap();
        let mut existing = records(2);
        existing[1].updated_on = existing[0].updated_on - Duration::days(1);
        let victims = policy.select_victims("AWB1", &existing).unwrap();
        assert_eq!(victims[0].id, Some(2));
    }

    #[test]
    fn test_lowered_cap_evicts_down_to_room_for_one() {
        let policy = EvictionPolicy::new(4).unwrap();
        let existing = records(10);
        let victims = policy.select_victims("AWB1", &existing).unwrap();
        let remarks: Vec<_> = victims.iter().map(|r| r.remark.as_str()).collect();
        assert_eq!(remarks, vec!["r0", "r1", "r2", "r3", "r4", "r5", "r6"]);
    }

    #[test]
    fn test_cap_of_one_always_replaces() {
        let policy = EvictionPolicy::new(1).unwrap();
        let existing = records(1);
        assert_eq!(policy.select_victims("AWB1", &existing).unwrap().len(), 1);
        assert!(policy.select_victims("AWB1", &[]).unwrap().is_empty());
    }
}
