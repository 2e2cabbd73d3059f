//! IST wall-clock helpers shared by the signal queue, order engine, and day
//! scheduler. India has no daylight-saving rule, so the offset is a fixed
//! `+05:30` rather than a database-backed `Tz`.

use chrono::{Datelike, NaiveDateTime, Timelike, Utc};
use chrono_tz::Asia::Kolkata;

/// Market window, local time: 09:15 to 15:30, weekdays only.
const MARKET_OPEN_MINUTE: u32 = 9 * 60 + 15;
const MARKET_CLOSE_MINUTE: u32 = 15 * 60 + 30;

/// Current wall-clock time converted to IST.
pub fn now_ist() -> NaiveDateTime {
    Utc::now().with_timezone(&Kolkata).naive_local()
}

/// Whether `now_ist()` falls within a trading day's market window.
pub fn is_market_time() -> bool {
    let now = now_ist();
    is_trading_day(now) && is_within_market_window(now)
}

/// Whether `when` (already in IST) is a weekday.
pub fn is_trading_day(when: NaiveDateTime) -> bool {
    !matches!(
        when.weekday(),
        chrono::Weekday::Sat | chrono::Weekday::Sun
    )
}

fn is_within_market_window(when: NaiveDateTime) -> bool {
    let minute_of_day = minute_of_day(when);
    (MARKET_OPEN_MINUTE..=MARKET_CLOSE_MINUTE).contains(&minute_of_day)
}

/// Minutes elapsed since local midnight. Used as the signal queue's
/// minute-bucket key - see `SPEC_FULL.md`/distilled spec section 4.E.
pub fn minute_of_day(when: NaiveDateTime) -> u32 {
    when.hour() * 60 + when.minute()
}

/// Whether `a` and `b` fall on the same IST calendar day. Backs the day
/// scheduler's "fires at most once per day" rule.
pub fn same_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 28)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn market_window_is_inclusive_of_open_and_close() {
        assert!(is_within_market_window(at(9, 15)));
        assert!(is_within_market_window(at(15, 30)));
        assert!(!is_within_market_window(at(9, 14)));
        assert!(!is_within_market_window(at(15, 31)));
    }

    #[test]
    fn weekends_are_not_trading_days() {
        // 2026-07-25 is a Saturday.
        let saturday = NaiveDate::from_ymd_opt(2026, 7, 25)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert!(!is_trading_day(saturday));
    }

    #[test]
    fn same_day_ignores_time_of_day() {
        assert!(same_day(at(9, 15), at(15, 30)));
        let tomorrow = at(9, 15) + chrono::Duration::days(1);
        assert!(!same_day(at(9, 15), tomorrow));
    }
}
