use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};

/// Time-bucket granularity for trend reports.
///
/// Chosen from the report window's total span so trend tables keep their
/// column counts in the tens: up to 2 days renders hourly (at most 48
/// buckets), up to 60 days daily, up to 52 weeks weekly, anything longer
/// monthly. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Resolution {
    pub fn from_span(span: Duration) -> Self {
        if span <= Duration::days(2) {
            Self::Hourly
        } else if span <= Duration::days(60) {
            Self::Daily
        } else if span <= Duration::weeks(52) {
            Self::Weekly
        } else {
            Self::Monthly
        }
    }

    /// Maps an instant to the start of its bucket.
    pub fn truncate(self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = |date: chrono::NaiveDate| date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        match self {
            Self::Hourly => instant
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap(),
            Self::Daily => midnight(instant.date_naive()),
            Self::Weekly => {
                let date = instant.date_naive();
                let days_from_monday = date.weekday().num_days_from_monday();
                midnight(date - Duration::days(i64::from(days_from_monday)))
            }
            Self::Monthly => midnight(instant.date_naive().with_day(1).unwrap()),
        }
    }

    /// Start of the bucket following `bucket`.
    pub fn next(self, bucket: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Hourly => bucket + Duration::hours(1),
            Self::Daily => bucket + Duration::days(1),
            Self::Weekly => bucket + Duration::weeks(1),
            Self::Monthly => bucket + Months::new(1),
        }
    }

    /// Column label for a bucket start.
    pub fn label(self, bucket: DateTime<Utc>) -> String {
        match self {
            Self::Hourly => bucket.format("%b %-d %H:00").to_string(),
            Self::Daily | Self::Weekly => bucket.format("%b %-d").to_string(),
            Self::Monthly => bucket.format("%b %Y").to_string(),
        }
    }

    /// Every bucket start covering `[since, until)`, in order.
    pub fn ticks(self, since: DateTime<Utc>, until: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut ticks = Vec::new();
        let mut tick = self.truncate(since);
        while tick < until {
            ticks.push(tick);
            tick = self.next(tick);
        }
        ticks
    }
}
