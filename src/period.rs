use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::invoice::Invoice;
use crate::monthly_sales::previous_month;

/// A date window for filtering reports, evaluated relative to "now".
///
/// Weeks start on Sunday. `Custom` bounds are inclusive dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    All,
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    Last7Days,
    Last30Days,
    LastMonth,
    LastQuarter,
    Custom { from: NaiveDate, to: NaiveDate },
}

fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

impl ReportPeriod {
    /// The period as a half-open `[start, end)` window, or `None` for
    /// `All`, which has no bounds.
    pub fn bounds(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let today = now.date();
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .map_or(NaiveDateTime::MAX, day_start);

        let window = match self {
            ReportPeriod::All => return None,
            ReportPeriod::Today => (day_start(today), tomorrow),
            ReportPeriod::Yesterday => (day_start(today - Days::new(1)), day_start(today)),
            ReportPeriod::ThisWeek => {
                let week_start = today - Days::new(today.weekday().num_days_from_sunday().into());
                (day_start(week_start), tomorrow)
            }
            ReportPeriod::ThisMonth => (day_start(today.with_day(1).unwrap()), tomorrow),
            // The rolling windows keep the time of day.
            ReportPeriod::Last7Days => (now - Duration::days(7), tomorrow),
            ReportPeriod::Last30Days => (now - Duration::days(30), tomorrow),
            ReportPeriod::LastMonth => {
                let (year, month) = previous_month(today.year(), today.month());
                (
                    day_start(NaiveDate::from_ymd_opt(year, month, 1).unwrap()),
                    day_start(today.with_day(1).unwrap()),
                )
            }
            ReportPeriod::LastQuarter => {
                let quarter = today.month0() / 3;
                let this_quarter =
                    NaiveDate::from_ymd_opt(today.year(), quarter * 3 + 1, 1).unwrap();
                let last_quarter = if quarter == 0 {
                    NaiveDate::from_ymd_opt(today.year() - 1, 10, 1).unwrap()
                } else {
                    NaiveDate::from_ymd_opt(today.year(), quarter * 3 - 2, 1).unwrap()
                };
                (day_start(last_quarter), day_start(this_quarter))
            }
            ReportPeriod::Custom { from, to } => {
                // The day after `to` can fall off the calendar.
                let end = to
                    .checked_add_days(Days::new(1))
                    .map_or(NaiveDateTime::MAX, day_start);
                (day_start(*from), end)
            }
        };
        Some(window)
    }

    /// Whether `timestamp` falls inside the period.
    pub fn contains(&self, now: NaiveDateTime, timestamp: NaiveDateTime) -> bool {
        match self.bounds(now) {
            None => true,
            Some((start, end)) => start <= timestamp && timestamp < end,
        }
    }

    /// Keeps only the items whose date falls inside the period.
    pub fn retain<T, F>(&self, items: &mut Vec<T>, now: NaiveDateTime, date_of: F)
    where
        F: Fn(&T) -> NaiveDateTime,
    {
        items.retain(|item| self.contains(now, date_of(item)));
    }
}

/// Keeps the invoices dated inside the period.
pub fn filter_invoices(period: ReportPeriod, now: NaiveDateTime, invoices: &mut Vec<Invoice>) {
    period.retain(invoices, now, |invoice| invoice.date);
}
