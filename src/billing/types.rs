use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::billing::charges::{AdditionalCharge, InvoiceItem};
use crate::billing::cycle::BillingCycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Active,
    Draft,
    Delinquent,
    Terminated,
    Completed,
    #[serde(other)]
    Unknown,
}

impl LeaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Delinquent => "delinquent",
            Self::Terminated => "terminated",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

/// Lease contract as the billing engine sees it. Read-only input; the engine
/// never writes leases.
#[derive(Debug, Clone, Deserialize)]
pub struct Lease {
    pub id: String,
    pub organization_id: String,
    pub tenant_id: String,
    pub unit_id: String,
    pub billing_cycle: BillingCycle,
    pub due_day: u32,
    pub rent_amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub additional_charges: Vec<AdditionalCharge>,
    pub starts_on: NaiveDate,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
    pub status: LeaseStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub organization_id: String,
    pub lease_id: String,
    pub tenant_id: String,
    pub unit_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    #[serde(default)]
    pub currency: String,
    pub status: InvoiceStatus,
}

/// Invoice to persist; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewInvoice {
    pub organization_id: String,
    pub lease_id: String,
    pub tenant_id: String,
    pub unit_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Per-lease outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub lease_id: String,
    pub invoice_id: Option<String>,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-organization summary of a monthly run.
#[derive(Debug, Clone, Serialize)]
pub struct OrgRunSummary {
    pub organization_id: String,
    pub organization_name: String,
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub sent: u32,
    pub sent_errors: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendInvoiceRequest {
    pub invoice_id: String,
    pub organization_id: String,
    pub tenant_id: String,
    pub channels: Vec<String>,
}

/// Outcome of a notification dispatch. Dispatch is fire-and-collect:
/// failures land in `errors`, never in a `Result::Err`.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub success: bool,
    pub errors: Vec<String>,
}

impl DispatchOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}
