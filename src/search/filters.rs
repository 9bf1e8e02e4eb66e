//! Size and date bucket predicates.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};

use super::query::{DateBucket, SizeBucket};

const KB: u64 = 1_000;
const MB: u64 = 1_000 * KB;
const GB: u64 = 1_000 * MB;

impl SizeBucket {
    /// Whether `size` bytes falls in this bucket.
    #[must_use]
    pub const fn contains(self, size: u64) -> bool {
        match self {
            Self::Empty => size == 0,
            Self::Tiny => size > 0 && size < 10 * KB,
            Self::VerySmall => size >= 10 * KB && size < 100 * KB,
            Self::Small => size >= 100 * KB && size < MB,
            Self::Medium => size >= MB && size < 50 * MB,
            Self::Large => size >= 50 * MB && size < GB,
            Self::Huge => size >= GB,
        }
    }
}

impl DateBucket {
    /// Whether `millis` (epoch ms) falls in this bucket relative to `now`.
    ///
    /// Today and yesterday are calendar days in local time; the other
    /// buckets count whole days back from the start of today.
    #[must_use]
    pub fn contains(self, millis: i64, now: DateTime<Local>) -> bool {
        let today = now.date_naive();
        let Some(start_today) = start_of_day(today) else {
            return false;
        };
        let days_back = |days: i64| start_of_day(today - Duration::days(days));

        match self {
            Self::Today => millis >= start_today,
            Self::Yesterday => days_back(1).is_some_and(|start| millis >= start && millis < start_today),
            Self::PastSevenDays => days_back(7).is_some_and(|start| millis >= start),
            Self::PastThirtyDays => days_back(30).is_some_and(|start| millis >= start),
            Self::PastSixMonths => months_back(today, 6)
                .and_then(start_of_day)
                .is_some_and(|start| millis >= start),
            Self::PastYear => months_back(today, 12)
                .and_then(start_of_day)
                .is_some_and(|start| millis >= start),
            Self::MoreThanYear => months_back(today, 12)
                .and_then(start_of_day)
                .is_some_and(|start| millis < start),
        }
    }
}

/// Local midnight of `date` in epoch milliseconds.
fn start_of_day(date: NaiveDate) -> Option<i64> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// Same day `months` months earlier, clamped to the month's length.
fn months_back(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let total = date.year() * 12 + date.month0() as i32 - months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    (1..=date.day())
        .rev()
        .find_map(|day| NaiveDate::from_ymd_opt(year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap())
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_size_buckets() {
        assert!(SizeBucket::Empty.contains(0));
        assert!(!SizeBucket::Tiny.contains(0));
        assert!(SizeBucket::Tiny.contains(9_999));
        assert!(SizeBucket::VerySmall.contains(10_000));
        assert!(SizeBucket::Small.contains(999_999));
        assert!(SizeBucket::Medium.contains(1_000_000));
        assert!(SizeBucket::Large.contains(50_000_000));
        assert!(SizeBucket::Huge.contains(1_000_000_000));
        assert!(!SizeBucket::Large.contains(1_000_000_000));
    }

    #[test]
    fn test_today_and_yesterday() {
        let now = local(2024, 3, 15, 14);
        let this_morning = local(2024, 3, 15, 1).timestamp_millis();
        let yesterday_noon = local(2024, 3, 14, 12).timestamp_millis();

        assert!(DateBucket::Today.contains(this_morning, now));
        assert!(!DateBucket::Today.contains(yesterday_noon, now));
        assert!(DateBucket::Yesterday.contains(yesterday_noon, now));
        assert!(!DateBucket::Yesterday.contains(this_morning, now));
    }

    #[test]
    fn test_rolling_buckets() {
        let now = local(2024, 3, 15, 14);
        let five_days = local(2024, 3, 10, 12).timestamp_millis();
        let twenty_days = local(2024, 2, 24, 12).timestamp_millis();
        let two_years = local(2022, 3, 1, 12).timestamp_millis();

        assert!(DateBucket::PastSevenDays.contains(five_days, now));
        assert!(!DateBucket::PastSevenDays.contains(twenty_days, now));
        assert!(DateBucket::PastThirtyDays.contains(twenty_days, now));
        assert!(DateBucket::PastSixMonths.contains(twenty_days, now));
        assert!(DateBucket::PastYear.contains(twenty_days, now));
        assert!(!DateBucket::PastYear.contains(two_years, now));
        assert!(DateBucket::MoreThanYear.contains(two_years, now));
        assert!(!DateBucket::MoreThanYear.contains(five_days, now));
    }

    #[test]
    fn test_months_back_clamps() {
        let date = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        assert_eq!(months_back(date, 6), NaiveDate::from_ymd_opt(2024, 2, 29));
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(months_back(date, 12), NaiveDate::from_ymd_opt(2023, 3, 15));
    }
}
