use async_trait::async_trait;

use crate::billing::error::BillingError;
use crate::billing::types::{
    DispatchOutcome, Invoice, Lease, NewInvoice, Organization, SendInvoiceRequest,
};

/// Read access to lease contracts.
#[async_trait]
pub trait LeaseRepository: Send + Sync {
    async fn list_active_leases(&self, organization_id: &str)
        -> Result<Vec<Lease>, BillingError>;

    /// Resolve a lease by id. Implementations return the lease even when it
    /// belongs to another organization; the engine classifies the mismatch
    /// as a cross-organization request.
    async fn find_lease_by_id(
        &self,
        lease_id: &str,
        organization_id: &str,
    ) -> Result<Option<Lease>, BillingError>;
}

/// Invoice persistence. `create_invoice` is the authoritative duplicate
/// guard: implementations map a uniqueness violation on
/// (lease, period_start, period_end) to `BillingError::DuplicateInvoice`.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, BillingError>;

    async fn find_invoices_by_lease(
        &self,
        lease_id: &str,
        organization_id: &str,
    ) -> Result<Vec<Invoice>, BillingError>;

    async fn find_invoice_by_id(
        &self,
        invoice_id: &str,
        organization_id: &str,
    ) -> Result<Option<Invoice>, BillingError>;
}

#[async_trait]
pub trait OrganizationRegistry: Send + Sync {
    async fn list_active_organizations(&self) -> Result<Vec<Organization>, BillingError>;

    async fn find_organization_by_id(
        &self,
        organization_id: &str,
    ) -> Result<Option<Organization>, BillingError>;
}

/// Downstream invoice delivery. Best-effort: failures come back inside the
/// outcome and never abort generation.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_invoice_to_tenant(&self, request: SendInvoiceRequest) -> DispatchOutcome;
}
