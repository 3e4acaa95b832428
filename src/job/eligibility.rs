use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Days to wait after the premiere before a movie may be posted.
///
/// Weekend premieres (Saturday, Sunday) wait `14 - weekday` days, weekday premieres wait
/// `7 - weekday` days, with Monday as 0.
pub fn wait_days(premiere: NaiveDate) -> i64 {
    let weekday = i64::from(premiere.weekday().num_days_from_monday());
    if weekday >= 5 {
        (weekday - 14) * -1
    } else {
        (weekday - 7) * -1
    }
}

/// Midnight of the first day the movie may be posted.
pub fn eligible_from(premiere: NaiveDate) -> NaiveDateTime {
    premiere.and_time(NaiveTime::MIN) + TimeDelta::days(wait_days(premiere))
}

pub fn is_eligible(premiere: NaiveDate, now: NaiveDateTime) -> bool {
    eligible_from(premiere) - now <= TimeDelta::zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn offsets_for_every_weekday() {
        // 2024-06-03 is a Monday.
        let expected = [7, 6, 5, 4, 3, 9, 8];
        for (offset, wait) in expected.into_iter().enumerate() {
            let premiere = date(2024, 6, 3) + TimeDelta::days(offset as i64);
            assert_eq!(wait_days(premiere), wait, "weekday {offset}");
        }
    }

    #[test]
    fn weekday_premiere_lands_on_following_monday() {
        // Friday 2024-06-07 waits 3 days.
        assert_eq!(
            eligible_from(date(2024, 6, 7)),
            date(2024, 6, 10).and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn weekend_premiere_uses_two_week_branch() {
        // Saturday 2024-06-08 waits 9 days, Sunday 2024-06-09 waits 8.
        assert_eq!(eligible_from(date(2024, 6, 8)).date(), date(2024, 6, 17));
        assert_eq!(eligible_from(date(2024, 6, 9)).date(), date(2024, 6, 17));
    }

    #[test]
    fn eligible_at_or_after_computed_date() {
        let premiere = date(2024, 6, 7);
        let boundary = date(2024, 6, 10).and_hms_opt(0, 0, 0).unwrap();
        assert!(!is_eligible(premiere, boundary - TimeDelta::seconds(1)));
        assert!(is_eligible(premiere, boundary));
        assert!(is_eligible(premiere, boundary + TimeDelta::days(30)));
        assert!(!is_eligible(premiere, premiere.and_hms_opt(12, 0, 0).unwrap()));
    }
}
