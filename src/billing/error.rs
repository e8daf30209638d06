use chrono::NaiveDate;

/// Typed failure taxonomy for invoice generation. Callers branch on the
/// variant, never on message text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BillingError {
    #[error("{0}")]
    Validation(String),

    #[error("Lease {0} was not found.")]
    LeaseNotFound(String),

    #[error("Organization {0} was not found.")]
    OrganizationNotFound(String),

    #[error("Lease {lease_id} belongs to a different organization.")]
    CrossOrganization { lease_id: String },

    #[error("Lease {lease_id} is not active (status: {status}).")]
    InactiveLease { lease_id: String, status: String },

    #[error("An invoice already exists for lease {lease_id} covering the period {period_start} to {period_end}.")]
    DuplicateInvoice {
        lease_id: String,
        period_start: NaiveDate,
        period_end: NaiveDate,
    },

    #[error("Lease {lease_id} is not active within the requested period.")]
    LeaseNotActiveForPeriod { lease_id: String },

    #[error("{0}")]
    Store(String),
}
