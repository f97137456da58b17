//! One-step recurrence advancement.
//!
//! A recurrence never materializes its whole series: after an occurrence
//! fires, exactly one decision is taken: create the next occurrence or
//! finish. The store therefore holds at most one pending occurrence per
//! active recurrence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::EndCondition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub interval_secs: i64,
    pub end: EndCondition,
}

/// Outcome of advancing a recurrence past a fired occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Create the next occurrence at this instant.
    Next(DateTime<Utc>),
    /// End condition satisfied; deactivate the recurrence.
    Finished,
}

impl RecurrenceRule {
    /// Decide what follows an occurrence that fired at `previous`.
    ///
    /// `fired` is the total occurrence count including the one that just
    /// fired. Conditions are evaluated count first, then date; `Never`
    /// always continues. The next time is anchored to the previous
    /// scheduled time, not to "now", so the series does not drift.
    pub fn next_after(&self, previous: DateTime<Utc>, fired: i32) -> Advance {
        if let EndCondition::AfterCount(n) = self.end {
            if fired >= n {
                return Advance::Finished;
            }
        }

        let next = previous + Duration::seconds(self.interval_secs);

        if let EndCondition::OnDate(until) = self.end {
            if next > until {
                return Advance::Finished;
            }
        }

        Advance::Next(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_never_keeps_going() {
        let rule = RecurrenceRule {
            interval_secs: 3600,
            end: EndCondition::Never,
        };
        assert_eq!(
            rule.next_after(utc("2025-01-01T09:00:00Z"), 10_000),
            Advance::Next(utc("2025-01-01T10:00:00Z"))
        );
    }

    #[test]
    fn test_after_count_terminates_on_third_fire() {
        let rule = RecurrenceRule {
            interval_secs: 86_400,
            end: EndCondition::AfterCount(3),
        };
        let mut time = utc("2025-01-01T09:00:00Z");

        // Occurrences 1 and 2 each schedule a successor one day later.
        for fired in 1..=2 {
            match rule.next_after(time, fired) {
                Advance::Next(next) => {
                    assert_eq!(next, time + Duration::days(1));
                    time = next;
                }
                Advance::Finished => panic!("terminated early at fire {fired}"),
            }
        }

        // The third fire satisfies the count; no fourth occurrence.
        assert_eq!(rule.next_after(time, 3), Advance::Finished);
        assert_eq!(rule.next_after(time, 4), Advance::Finished);
    }

    #[test]
    fn test_on_date_terminates_when_next_exceeds_bound() {
        let rule = RecurrenceRule {
            interval_secs: 86_400,
            end: EndCondition::OnDate(utc("2025-01-03T00:00:00Z")),
        };
        assert_eq!(
            rule.next_after(utc("2025-01-01T09:00:00Z"), 1),
            Advance::Finished
        );
        assert_eq!(
            rule.next_after(utc("2025-01-01T09:00:00Z"), 0),
            Advance::Finished
        );

        let inside = RecurrenceRule {
            interval_secs: 3600,
            end: EndCondition::OnDate(utc("2025-01-03T00:00:00Z")),
        };
        assert_eq!(
            inside.next_after(utc("2025-01-01T09:00:00Z"), 1),
            Advance::Next(utc("2025-01-01T10:00:00Z"))
        );
    }

    #[test]
    fn test_count_checked_before_date() {
        let rule = RecurrenceRule {
            interval_secs: 3600,
            end: EndCondition::AfterCount(1),
        };
        assert_eq!(
            rule.next_after(utc("2025-01-01T09:00:00Z"), 1),
            Advance::Finished
        );
    }

    #[test]
    fn test_next_anchored_to_previous_schedule() {
        let rule = RecurrenceRule {
            interval_secs: 7200,
            end: EndCondition::Never,
        };
        // Anchoring to the previous slot keeps the cadence even if the
        // publish itself ran late.
        assert_eq!(
            rule.next_after(utc("2025-06-01T08:00:00Z"), 5),
            Advance::Next(utc("2025-06-01T10:00:00Z"))
        );
    }
}
