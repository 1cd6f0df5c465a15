//! Next-occurrence calculation for repeat rules.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::RepeatRule;

/// Next instant strictly after `now` at which a reminder anchored at `anchor` fires.
///
/// Wall-clock math (time of day, weekday, day of month) happens in `zone_id`;
/// an unknown zone falls back to UTC. Returns `None` only for one-time
/// reminders whose anchor is not after `now`.
pub fn next_occurrence(
    anchor: DateTime<Utc>,
    zone_id: &str,
    rule: RepeatRule,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let tz: Tz = zone_id.trim().parse().unwrap_or(Tz::UTC);
    let anchor_local = anchor.with_timezone(&tz);
    let now_local = now.with_timezone(&tz);
    let time_of_day = anchor_local.time();

    match rule {
        RepeatRule::None => (anchor > now).then_some(anchor),
        RepeatRule::EveryMinute => {
            let base = anchor_local
                .naive_local()
                .with_second(0)
                .and_then(|local| local.with_nanosecond(0))
                .map(|local| resolve_local(tz, local))?;
            if base > now {
                return Some(base);
            }
            let mut candidate = base + Duration::minutes((now - base).num_minutes());
            while candidate <= now {
                candidate += Duration::minutes(1);
            }
            Some(candidate)
        }
        RepeatRule::Daily => {
            let mut date = now_local.date_naive();
            loop {
                let candidate = resolve_local(tz, date.and_time(time_of_day));
                if candidate > now {
                    return Some(candidate);
                }
                date = date.succ_opt()?;
            }
        }
        RepeatRule::Weekly => {
            let today = now_local.date_naive();
            let days_ahead = (anchor_local.weekday().num_days_from_monday() + 7
                - today.weekday().num_days_from_monday())
                % 7;
            let mut date = today + Duration::days(i64::from(days_ahead));
            loop {
                let candidate = resolve_local(tz, date.and_time(time_of_day));
                if candidate > now {
                    return Some(candidate);
                }
                date = date.checked_add_signed(Duration::days(7))?;
            }
        }
        RepeatRule::Monthly => {
            let day = anchor_local.day();
            let (mut year, mut month) = (now_local.year(), now_local.month());
            loop {
                let candidate = clamped_candidate(tz, year, month, day, time_of_day)?;
                if candidate > now {
                    return Some(candidate);
                }
                (year, month) = if month == 12 {
                    (year + 1, 1)
                } else {
                    (year, month + 1)
                };
            }
        }
        RepeatRule::Yearly => {
            let (month, day) = (anchor_local.month(), anchor_local.day());
            let mut year = now_local.year();
            loop {
                let candidate = clamped_candidate(tz, year, month, day, time_of_day)?;
                if candidate > now {
                    return Some(candidate);
                }
                year += 1;
            }
        }
    }
}

/// Number of days in a calendar month
fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(28, |last| last.day())
}

/// `day` of the given month clamped to its length, at `time`
fn clamped_candidate(
    tz: Tz,
    year: i32,
    month: u32,
    day: u32,
    time: NaiveTime,
) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)))?;
    Some(resolve_local(tz, date.and_time(time)))
}

/// Map a wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// DST gap move forward by the gap.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map_or_else(
            || Utc.from_utc_datetime(&local),
            |resolved| resolved.with_timezone(&Utc),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    const ALL_RULES: [RepeatRule; 6] = [
        RepeatRule::None,
        RepeatRule::EveryMinute,
        RepeatRule::Daily,
        RepeatRule::Weekly,
        RepeatRule::Monthly,
        RepeatRule::Yearly,
    ];

    #[test]
    fn one_time_future_anchor_is_returned() {
        let anchor = utc("2024-05-01T10:00:00Z");
        let now = utc("2024-04-30T10:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::None, now),
            Some(anchor)
        );
    }

    #[test]
    fn one_time_anchor_at_or_before_now_is_none() {
        let anchor = utc("2024-05-01T10:00:00Z");
        assert_eq!(next_occurrence(anchor, "UTC", RepeatRule::None, anchor), None);
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::None, anchor + Duration::seconds(1)),
            None
        );
    }

    #[test]
    fn every_minute_rounds_seconds_and_advances() {
        let anchor = utc("2024-05-01T10:00:42Z");
        let now = utc("2024-05-01T10:05:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::EveryMinute, now),
            Some(utc("2024-05-01T10:06:00Z"))
        );
    }

    #[test]
    fn daily_uses_anchor_time_in_zone() {
        // 09:30 in Kolkata is 04:00 UTC
        let anchor = utc("2020-01-01T04:00:00Z");
        let before = utc("2024-05-01T03:00:00Z");
        let after = utc("2024-05-01T05:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "Asia/Kolkata", RepeatRule::Daily, before),
            Some(utc("2024-05-01T04:00:00Z"))
        );
        assert_eq!(
            next_occurrence(anchor, "Asia/Kolkata", RepeatRule::Daily, after),
            Some(utc("2024-05-02T04:00:00Z"))
        );
    }

    #[test]
    fn daily_keeps_wall_clock_across_dst() {
        // 08:00 New York: EST (UTC-5) in January, EDT (UTC-4) in July
        let anchor = utc("2024-01-10T13:00:00Z");
        let now = utc("2024-07-01T00:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "America/New_York", RepeatRule::Daily, now),
            Some(utc("2024-07-01T12:00:00Z"))
        );
    }

    #[test]
    fn daily_anchor_inside_dst_gap_moves_forward() {
        // 02:30 does not exist in New York on 2024-03-10
        let anchor = utc("2024-03-01T07:30:00Z");
        let now = utc("2024-03-10T05:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "America/New_York", RepeatRule::Daily, now),
            Some(utc("2024-03-10T07:30:00Z"))
        );
    }

    #[test]
    fn weekly_finds_next_weekday() {
        // Anchor on a Monday at 10:00 UTC; now is Wednesday
        let anchor = utc("2024-04-29T10:00:00Z");
        let now = utc("2024-05-01T12:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Weekly, now),
            Some(utc("2024-05-06T10:00:00Z"))
        );
    }

    #[test]
    fn weekly_same_day_after_time_advances_a_week() {
        let anchor = utc("2024-04-29T10:00:00Z");
        let now = utc("2024-05-06T10:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Weekly, now),
            Some(utc("2024-05-13T10:00:00Z"))
        );
    }

    #[test]
    fn monthly_clamps_to_short_months() {
        let anchor = utc("2024-01-31T09:00:00Z");
        let now = utc("2024-04-01T00:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Monthly, now),
            Some(utc("2024-04-30T09:00:00Z"))
        );
    }

    #[test]
    fn monthly_clamps_each_month_independently() {
        let anchor = utc("2024-01-31T09:00:00Z");
        // February 29 2024 has passed; March keeps day 31
        let now = utc("2024-02-29T10:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Monthly, now),
            Some(utc("2024-03-31T09:00:00Z"))
        );
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        let anchor = utc("2024-01-15T09:00:00Z");
        let now = utc("2024-12-20T00:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Monthly, now),
            Some(utc("2025-01-15T09:00:00Z"))
        );
    }

    #[test]
    fn yearly_leap_day_clamps_in_common_years() {
        let anchor = utc("2024-02-29T08:00:00Z");
        let now = utc("2024-03-01T00:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Yearly, now),
            Some(utc("2025-02-28T08:00:00Z"))
        );
        let now = utc("2027-03-01T00:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "UTC", RepeatRule::Yearly, now),
            Some(utc("2028-02-29T08:00:00Z"))
        );
    }

    #[test]
    fn yearly_future_anchor_this_year_is_returned() {
        let anchor = utc("2024-06-15T18:30:00Z");
        let now = anchor - Duration::hours(1);
        assert_eq!(
            next_occurrence(anchor, "Asia/Kolkata", RepeatRule::Yearly, now),
            Some(anchor)
        );
    }

    #[test]
    fn occurrence_equal_to_now_is_advanced() {
        let anchor = utc("2024-05-01T10:00:00Z");
        for rule in ALL_RULES.into_iter().filter(|rule| rule.is_repeating()) {
            let next = next_occurrence(anchor, "UTC", rule, anchor).unwrap();
            assert!(next > anchor, "{rule} returned {next}");
        }
    }

    #[test]
    fn repeating_rules_are_always_strictly_future() {
        let anchor = utc("2023-01-31T23:59:30Z");
        let zones = ["UTC", "Asia/Kolkata", "America/New_York", "Pacific/Auckland"];
        let mut now = utc("2023-01-01T00:00:00Z");
        while now < utc("2025-01-01T00:00:00Z") {
            for zone in zones {
                for rule in ALL_RULES.into_iter().filter(|rule| rule.is_repeating()) {
                    let next = next_occurrence(anchor, zone, rule, now).unwrap();
                    assert!(next > now, "{rule} in {zone} at {now} returned {next}");
                }
            }
            now += Duration::hours(37);
        }
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let anchor = utc("2024-01-01T10:00:00Z");
        let now = utc("2024-05-01T00:00:00Z");
        assert_eq!(
            next_occurrence(anchor, "Not/AZone", RepeatRule::Daily, now),
            Some(utc("2024-05-01T10:00:00Z"))
        );
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 4), 30);
    }
}
