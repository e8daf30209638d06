use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Recurrence unit for rent and recurring charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Annually,
}

impl BillingCycle {
    pub fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annually => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annually => "annually",
        }
    }

    pub fn rent_description(self) -> &'static str {
        match self {
            Self::Monthly => "Monthly Rent",
            Self::Quarterly => "Quarterly Rent",
            Self::Annually => "Annual Rent",
        }
    }
}

/// Inclusive calendar range covered by one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BillingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Number of calendar days between `reference_start` and the same calendar
/// point one cycle later. Months of different lengths yield different day
/// counts; the advancement clamps end-of-month (Jan 31 + 1 month = Feb 28/29).
pub fn cycle_length_days(cycle: BillingCycle, reference_start: NaiveDate) -> i64 {
    let next = reference_start
        .checked_add_months(Months::new(cycle.months()))
        .unwrap_or(reference_start);
    (next - reference_start).num_days()
}

/// Calendar-aligned period containing `reference_date`: starts on the first
/// day of that month and spans one full cycle, inclusive on both ends.
pub fn aligned_period(cycle: BillingCycle, reference_date: NaiveDate) -> BillingPeriod {
    let start = reference_date.with_day(1).unwrap_or(reference_date);
    let end = start
        .checked_add_months(Months::new(cycle.months()))
        .map(|next| next - Duration::days(1))
        .unwrap_or(start);
    BillingPeriod { start, end }
}

/// Inclusive day count of a window: both boundary dates count.
pub fn days_covered(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

/// Scale `base_amount` by the ratio of covered days to the full period
/// length, rounded to the nearest whole unit. Non-positive day counts
/// prorate to zero.
pub fn prorate(base_amount: f64, total_days: i64, actual_days: i64) -> f64 {
    if total_days <= 0 || actual_days <= 0 {
        return 0.0;
    }
    (base_amount * actual_days as f64 / total_days as f64).round()
}

/// Map an issue date and a due day-of-month to the next occurrence of that
/// day, clamping to the target month's length. The result is never before
/// the issue date.
pub fn resolve_due_date(issue_date: NaiveDate, due_day: u32) -> NaiveDate {
    let day = due_day.clamp(1, 31);
    let candidate = clamped_date(issue_date.year(), issue_date.month(), day, issue_date);
    if candidate >= issue_date {
        return candidate;
    }
    let next_month = issue_date
        .checked_add_months(Months::new(1))
        .unwrap_or(issue_date);
    clamped_date(next_month.year(), next_month.month(), day, issue_date)
}

fn clamped_date(year: i32, month: u32, day: u32, fallback: NaiveDate) -> NaiveDate {
    let last = days_in_month(year, month);
    NaiveDate::from_ymd_opt(year, month, day.min(last)).unwrap_or(fallback)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 30;
    };
    let next = first
        .checked_add_months(Months::new(1))
        .unwrap_or(first + Duration::days(30));
    (next - first).num_days().max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn cycle_length_tracks_calendar_months() {
        assert_eq!(cycle_length_days(BillingCycle::Monthly, date("2024-01-01")), 31);
        assert_eq!(cycle_length_days(BillingCycle::Monthly, date("2024-02-01")), 29);
        assert_eq!(cycle_length_days(BillingCycle::Monthly, date("2023-02-01")), 28);
        assert_eq!(cycle_length_days(BillingCycle::Monthly, date("2024-04-01")), 30);
        assert_eq!(cycle_length_days(BillingCycle::Quarterly, date("2024-01-01")), 91);
        assert_eq!(cycle_length_days(BillingCycle::Annually, date("2024-01-01")), 366);
        assert_eq!(cycle_length_days(BillingCycle::Annually, date("2023-01-01")), 365);
    }

    #[test]
    fn aligned_period_starts_on_first_of_month() {
        let period = aligned_period(BillingCycle::Monthly, date("2024-02-10"));
        assert_eq!(period.start, date("2024-02-01"));
        assert_eq!(period.end, date("2024-02-29"));

        let period = aligned_period(BillingCycle::Quarterly, date("2024-01-15"));
        assert_eq!(period.start, date("2024-01-01"));
        assert_eq!(period.end, date("2024-03-31"));

        let period = aligned_period(BillingCycle::Annually, date("2024-07-04"));
        assert_eq!(period.start, date("2024-07-01"));
        assert_eq!(period.end, date("2025-06-30"));
    }

    #[test]
    fn days_covered_is_inclusive() {
        assert_eq!(days_covered(date("2024-04-15"), date("2024-04-30")), 16);
        assert_eq!(days_covered(date("2024-04-01"), date("2024-04-01")), 1);
    }

    #[test]
    fn prorates_by_day_ratio() {
        assert_eq!(prorate(5000.0, 30, 16), 2667.0);
        assert_eq!(prorate(3000.0, 30, 16), 1600.0);
        assert_eq!(prorate(5000.0, 31, 31), 5000.0);
    }

    #[test]
    fn prorate_returns_zero_for_non_positive_day_counts() {
        assert_eq!(prorate(5000.0, 0, 10), 0.0);
        assert_eq!(prorate(5000.0, 30, 0), 0.0);
        assert_eq!(prorate(5000.0, -5, 10), 0.0);
        assert_eq!(prorate(5000.0, 30, -1), 0.0);
    }

    #[test]
    fn due_date_clamps_to_month_length() {
        assert_eq!(resolve_due_date(date("2024-01-20"), 31), date("2024-01-31"));
        assert_eq!(resolve_due_date(date("2024-02-20"), 31), date("2024-02-29"));
        assert_eq!(resolve_due_date(date("2023-02-20"), 31), date("2023-02-28"));
    }

    #[test]
    fn due_date_rolls_over_when_day_already_passed() {
        assert_eq!(resolve_due_date(date("2024-01-20"), 5), date("2024-02-05"));
        assert_eq!(resolve_due_date(date("2024-01-05"), 5), date("2024-01-05"));
        assert_eq!(resolve_due_date(date("2024-01-31"), 30), date("2024-02-29"));
    }

    #[test]
    fn due_date_is_never_before_issue_date() {
        for day in 1..=31u32 {
            let issue = date("2024-03-17");
            assert!(resolve_due_date(issue, day) >= issue);
        }
    }
}
