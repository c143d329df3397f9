use chrono::{Local, NaiveDate};

/// Turns a tool's `date_query` into the calendar day sent to the backend.
///
/// Only "yesterday" is recognised; every other query, including literal
/// `YYYY-MM-DD` strings, resolves to today.
pub fn resolve_date(date_query: &str) -> NaiveDate {
    resolve_date_from(date_query, Local::now().date_naive())
}

pub fn resolve_date_from(date_query: &str, today: NaiveDate) -> NaiveDate {
    if date_query.to_lowercase().contains("yesterday") {
        today.pred_opt().unwrap_or(today)
    } else {
        today
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn yesterday_is_the_previous_day() {
        let today = Local::now().date_naive();
        assert_eq!(resolve_date("yesterday"), today - Duration::days(1));
        assert_eq!(resolve_date_from("Yesterday's signups", day(2024, 3, 1)), day(2024, 2, 29));
    }

    #[test]
    fn literal_dates_resolve_to_today() {
        let today = day(2025, 6, 15);
        assert_eq!(resolve_date_from("2024-01-01", today), today);
        assert_eq!(resolve_date_from("today", today), today);
        assert_eq!(resolve_date_from("", today), today);
        assert_eq!(resolve_date("2024-01-01"), Local::now().date_naive());
    }
}
