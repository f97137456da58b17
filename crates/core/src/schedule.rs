//! Pure scheduling calculator.
//!
//! Computes target publish instants for bulk distribution and validates
//! caller-supplied custom times. All slot math happens in the configured
//! local timezone and is normalized to UTC before anything is stored.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{EngineError, EngineResult};
use crate::types::PostingWindow;

/// Evenly space `count` slots starting at `start`, `interval` apart.
///
/// The interval is clamped to at least one second so the result is always
/// strictly increasing.
pub fn distribute(start: DateTime<Utc>, count: usize, interval: Duration) -> Vec<DateTime<Utc>> {
    let step = if interval < Duration::seconds(1) {
        Duration::seconds(1)
    } else {
        interval
    };
    (0..count as i64).map(|i| start + step * i as i32).collect()
}

/// Lay `count` slots inside a daily posting window, starting on `first_day`.
///
/// Slots run from `start_hour` every `interval_hours`; once a slot would
/// land at or past `end_hour` the sequence rolls over to the next day's
/// `start_hour`. Local times that fall into a DST gap are skipped.
pub fn window_slots(
    window: &PostingWindow,
    count: usize,
    first_day: NaiveDate,
    tz: Tz,
) -> Vec<DateTime<Utc>> {
    let mut slots = Vec::with_capacity(count);
    let mut cursor = match first_day.and_hms_opt(window.start_hour, 0, 0) {
        Some(naive) => naive,
        None => return slots,
    };

    while slots.len() < count {
        if cursor.hour() >= window.start_hour && cursor.hour() < window.end_hour {
            if let Some(instant) = local_to_instant(cursor, tz) {
                slots.push(instant);
            }
            cursor += Duration::hours(window.interval_hours as i64);
        } else {
            let next_day = cursor.date() + Duration::days(1);
            cursor = match next_day.and_hms_opt(window.start_hour, 0, 0) {
                Some(naive) => naive,
                None => break,
            };
        }
    }

    slots
}

/// Resolve a local wall-clock time to an absolute instant.
///
/// Ambiguous times (fall-back overlap) resolve to the earlier mapping;
/// nonexistent times (spring-forward gap) yield `None`.
pub fn local_to_instant(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        chrono::LocalResult::None => None,
    }
}

/// Reject any time that is not strictly after `now`. Ordering between the
/// times themselves is not required; independent posts may interleave.
pub fn validate_times(times: &[DateTime<Utc>], now: DateTime<Utc>) -> EngineResult<()> {
    for time in times {
        if *time <= now {
            return Err(EngineError::PastTime(*time));
        }
    }
    Ok(())
}

/// A schedule call is always single-channel; return that channel or reject.
pub fn single_channel(channel_ids: &[String]) -> EngineResult<&str> {
    let first = channel_ids
        .first()
        .ok_or_else(|| EngineError::NotFound("posts".to_string()))?;
    if channel_ids.iter().any(|id| id != first) {
        return Err(EngineError::MixedChannel);
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Kyiv;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_distribute_hourly() {
        let slots = distribute(utc("2025-01-01T09:00:00Z"), 5, Duration::hours(1));
        assert_eq!(
            slots,
            vec![
                utc("2025-01-01T09:00:00Z"),
                utc("2025-01-01T10:00:00Z"),
                utc("2025-01-01T11:00:00Z"),
                utc("2025-01-01T12:00:00Z"),
                utc("2025-01-01T13:00:00Z"),
            ]
        );
    }

    #[test]
    fn test_distribute_strictly_increasing_even_with_zero_interval() {
        let slots = distribute(utc("2025-01-01T09:00:00Z"), 4, Duration::zero());
        for pair in slots.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_distribute_empty() {
        assert!(distribute(utc("2025-01-01T09:00:00Z"), 0, Duration::hours(1)).is_empty());
    }

    #[test]
    fn test_window_slots_roll_to_next_day() {
        let window = PostingWindow {
            start_hour: 10,
            end_hour: 20,
            interval_hours: 2,
        };
        let day = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let slots = window_slots(&window, 7, day, chrono_tz::UTC);

        // 10..18 fills the first day (five slots), then the window rolls over.
        assert_eq!(slots[0], utc("2025-01-15T10:00:00Z"));
        assert_eq!(slots[4], utc("2025-01-15T18:00:00Z"));
        assert_eq!(slots[5], utc("2025-01-16T10:00:00Z"));
        assert_eq!(slots[6], utc("2025-01-16T12:00:00Z"));
    }

    #[test]
    fn test_window_slots_local_tz_normalized() {
        let window = PostingWindow {
            start_hour: 9,
            end_hour: 20,
            interval_hours: 2,
        };
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let slots = window_slots(&window, 1, day, Kyiv);
        // Kyiv is UTC+2 in January.
        assert_eq!(slots[0], utc("2025-01-01T07:00:00Z"));
    }

    #[test]
    fn test_local_to_instant_dst_gap_is_none() {
        // Kyiv springs forward 03:00 -> 04:00 on 2025-03-30.
        let naive = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap();
        assert_eq!(local_to_instant(naive, Kyiv), None);
    }

    #[test]
    fn test_local_to_instant_ambiguous_picks_earliest() {
        // Kyiv falls back 04:00 -> 03:00 on 2025-10-26; 03:30 occurs twice.
        let naive = NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_hms_opt(3, 30, 0)
            .unwrap();
        // Earliest mapping is still summer time (UTC+3).
        assert_eq!(
            local_to_instant(naive, Kyiv),
            Some(utc("2025-10-26T00:30:00Z"))
        );
    }

    #[test]
    fn test_validate_times_rejects_past() {
        let now = utc("2025-01-01T12:00:00Z");
        let err = validate_times(&[utc("2025-01-01T13:00:00Z"), utc("2025-01-01T12:00:00Z")], now)
            .unwrap_err();
        assert!(matches!(err, EngineError::PastTime(_)));
    }

    #[test]
    fn test_validate_times_accepts_unordered_future() {
        let now = utc("2025-01-01T12:00:00Z");
        let times = [utc("2025-01-02T09:00:00Z"), utc("2025-01-01T18:00:00Z")];
        assert!(validate_times(&times, now).is_ok());
    }

    #[test]
    fn test_single_channel_ok() {
        let ids = vec!["ch_a".to_string(), "ch_a".to_string()];
        assert_eq!(single_channel(&ids).unwrap(), "ch_a");
    }

    #[test]
    fn test_single_channel_mixed_rejected() {
        let ids = vec!["ch_a".to_string(), "ch_b".to_string()];
        assert!(matches!(
            single_channel(&ids).unwrap_err(),
            EngineError::MixedChannel
        ));
    }

    #[test]
    fn test_single_channel_empty_rejected() {
        assert!(matches!(
            single_channel(&[]).unwrap_err(),
            EngineError::NotFound(_)
        ));
    }
}
