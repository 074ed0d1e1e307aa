//! Calendar rules: maturity, submission window, due dates and overdue buckets

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Field, ValidationError};
use crate::rates::validate_duration;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Day the admin reporting window starts each month (runs to the 7th of the next month)
pub const REPORTING_WINDOW_START_DAY: u32 = 8;

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    let next = first + Months::new(1);
    (next - first).num_days() as u32
}

/// `date` moved to `day` within the same month, clamped to the month's last day
fn on_day(date: NaiveDate, day: u32) -> NaiveDate {
    let day = day.clamp(1, last_day_of_month(date.year(), date.month()));
    date.with_day(day).unwrap_or(date)
}

/// Maturity date: start plus whole calendar months, clamped to month end (Jan 31 + 1 = Feb 29/28)
pub fn investment_maturity_date(
    submitted_at: DateTime<Utc>,
    duration_months: u32,
) -> Result<NaiveDate, ValidationError> {
    validate_duration(duration_months)?;
    submitted_at
        .date_naive()
        .checked_add_months(Months::new(duration_months))
        .ok_or_else(|| ValidationError::new(Field::SubmittedAt, "maturity date out of range"))
}

/// Recurring monthly window, from `opens_day` through `closes_day` of the following month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionWindow {
    pub opens_day: u32,
    pub closes_day: u32,
}

impl Default for SubmissionWindow {
    fn default() -> Self {
        Self {
            opens_day: 28,
            closes_day: 8,
        }
    }
}

impl SubmissionWindow {
    pub(crate) fn is_valid(&self) -> bool {
        (1..=31).contains(&self.opens_day)
            && (1..=31).contains(&self.closes_day)
            && self.closes_day < self.opens_day
    }

    /// Whether a date falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        let day = date.day();
        // Short months still open on their last day when opens_day exceeds it
        day >= self.opens_day.min(last_day_of_month(date.year(), date.month()))
            || day <= self.closes_day
    }

    /// Whether new loan applications are taken into the current cycle
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.contains(now.date_naive())
    }

    /// First date on or after `date` that lies inside the window
    pub fn next_opening(&self, date: NaiveDate) -> NaiveDate {
        if self.contains(date) {
            date
        } else {
            on_day(date, self.opens_day)
        }
    }

    /// Maturity itself when it already falls inside the window, otherwise the
    /// opening day of the maturity's month. Not a nearest-window search.
    pub fn earliest_withdrawal_date(&self, maturity: NaiveDate) -> NaiveDate {
        if self.contains(maturity) {
            maturity
        } else {
            on_day(maturity, self.opens_day)
        }
    }
}

/// Explicit due date if set, otherwise approval plus the grace period
pub fn loan_repayment_due_date(
    approved_at: Option<DateTime<Utc>>,
    explicit_due_date: Option<DateTime<Utc>>,
    grace_days: i64,
) -> Result<DateTime<Utc>, ValidationError> {
    if let Some(due) = explicit_due_date {
        return Ok(due);
    }
    let approved_at = approved_at.ok_or_else(|| ValidationError::missing(Field::ApprovedAt))?;
    approved_at
        .checked_add_signed(Duration::days(grace_days))
        .ok_or_else(|| ValidationError::new(Field::DueDate, "due date out of range"))
}

/// Urgency bucket for a due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBucket {
    Overdue,
    Upcoming,
    NotYetDue,
}

/// Days until due and the resulting bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueStatus {
    pub days_left: i64,
    pub bucket: DueBucket,
}

/// `days_left = ceil((due - now) / 1 day)`; negative means overdue
pub fn overdue_classification(
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    urgency_horizon_days: i64,
) -> DueStatus {
    let millis = (due_date - now).num_milliseconds();
    // Integer division truncates toward zero, which is already the ceiling for negatives
    let days_left = if millis > 0 && millis % MILLIS_PER_DAY != 0 {
        millis / MILLIS_PER_DAY + 1
    } else {
        millis / MILLIS_PER_DAY
    };

    let bucket = if days_left < 0 {
        DueBucket::Overdue
    } else if days_left <= urgency_horizon_days {
        DueBucket::Upcoming
    } else {
        DueBucket::NotYetDue
    };

    DueStatus { days_left, bucket }
}

/// Whole calendar months from `start` to `now`, at least 1 and at most `cap`
pub fn elapsed_months(start: DateTime<Utc>, now: DateTime<Utc>, cap: u32) -> u32 {
    let (from, to) = (start.date_naive(), now.date_naive());
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if months > 0 && from.checked_add_months(Months::new(months as u32)).is_some_and(|d| d > to) {
        months -= 1;
    }
    (months.max(1) as u32).min(cap.max(1))
}

/// Admin "this month" reporting window: the 8th through the 7th of the next month
pub fn reporting_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_month = if today.day() >= REPORTING_WINDOW_START_DAY {
        on_day(today, 1)
    } else {
        on_day(today, 1) - Months::new(1)
    };
    let start = on_day(start_month, REPORTING_WINDOW_START_DAY);
    let end = on_day(start_month + Months::new(1), REPORTING_WINDOW_START_DAY - 1);
    (start, end)
}
