//! Business-day calendar used to date forecast points

use chrono::{Datelike, Days, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The next `count` Monday-to-Friday dates strictly after `last`
pub fn business_days_after(last: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut day = last;
    while dates.len() < count {
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
        if is_business_day(day) {
            dates.push(day);
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_weekends() {
        // Friday
        let last = NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
        let days = business_days_after(last, 3);
        assert_eq!(
            days,
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
            ]
        );
        assert!(business_days_after(last, 0).is_empty());
    }
}
