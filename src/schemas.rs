use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::billing::charges::InvoiceItem;
use crate::billing::cycle::BillingPeriod;
use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateInvoiceInput {
    #[validate(length(min = 1))]
    pub organization_id: String,
    #[validate(length(min = 1))]
    pub lease_id: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// Manually composed line items; when present they are used verbatim.
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BatchGenerateInput {
    #[validate(length(min = 1))]
    pub organization_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyRunInput {
    pub organization_id: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub auto_send: bool,
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicesQuery {
    pub org_id: String,
    pub lease_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicePath {
    pub invoice_id: String,
}

pub fn clamp_limit_in_range(limit: Option<i64>, min: i64, max: i64) -> i64 {
    limit.unwrap_or(max).clamp(min, max)
}

/// Pair optional period bounds: callers must supply both or neither.
pub fn optional_period(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Option<BillingPeriod>, AppError> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(BillingPeriod::new(start, end))),
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(
            "period_start and period_end must be provided together.".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{clamp_limit_in_range, optional_period};

    #[test]
    fn clamps_limits() {
        assert_eq!(clamp_limit_in_range(None, 1, 500), 500);
        assert_eq!(clamp_limit_in_range(Some(0), 1, 500), 1);
        assert_eq!(clamp_limit_in_range(Some(9999), 1, 500), 500);
        assert_eq!(clamp_limit_in_range(Some(25), 1, 500), 25);
    }

    #[test]
    fn period_bounds_must_come_in_pairs() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1);
        let end = NaiveDate::from_ymd_opt(2024, 4, 30);
        assert!(optional_period(start, end).expect("valid pair").is_some());
        assert!(optional_period(None, None).expect("valid pair").is_none());
        assert!(optional_period(start, None).is_err());
        assert!(optional_period(None, end).is_err());
    }
}
