use std::sync::Arc;

use chrono::Utc;

use crate::billing::charges::{build_invoice_items, items_subtotal, round2, InvoiceItem};
use crate::billing::cycle::{
    aligned_period, cycle_length_days, days_covered, resolve_due_date, BillingPeriod,
};
use crate::billing::error::BillingError;
use crate::billing::ports::{
    InvoiceStore, LeaseRepository, NotificationDispatcher, OrganizationRegistry,
};
use crate::billing::types::{Invoice, InvoiceStatus, LeaseStatus, NewInvoice};

/// Recurring-billing engine. All I/O goes through the injected collaborator
/// traits, so the engine runs unchanged against Postgres adapters or
/// in-memory fakes.
#[derive(Clone)]
pub struct InvoiceEngine {
    pub(crate) leases: Arc<dyn LeaseRepository>,
    pub(crate) invoices: Arc<dyn InvoiceStore>,
    pub(crate) organizations: Arc<dyn OrganizationRegistry>,
    pub(crate) dispatcher: Arc<dyn NotificationDispatcher>,
    pub(crate) tax_rate: f64,
}

impl InvoiceEngine {
    pub fn new(
        leases: Arc<dyn LeaseRepository>,
        invoices: Arc<dyn InvoiceStore>,
        organizations: Arc<dyn OrganizationRegistry>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        tax_rate: f64,
    ) -> Self {
        Self {
            leases,
            invoices,
            organizations,
            dispatcher,
            tax_rate,
        }
    }

    /// Generate one invoice for one lease. The single-lease entry point
    /// always enforces per-period idempotency; force regeneration is only
    /// reachable through the batch path.
    pub async fn generate_invoice_for_lease(
        &self,
        lease_id: &str,
        organization_id: &str,
        period: Option<BillingPeriod>,
        custom_items: Option<Vec<InvoiceItem>>,
    ) -> Result<Invoice, BillingError> {
        self.generate_with_options(lease_id, organization_id, period, custom_items, false)
            .await
    }

    pub(crate) async fn generate_with_options(
        &self,
        lease_id: &str,
        organization_id: &str,
        period: Option<BillingPeriod>,
        custom_items: Option<Vec<InvoiceItem>>,
        skip_duplicate_check: bool,
    ) -> Result<Invoice, BillingError> {
        if let Some(requested) = &period {
            if requested.end < requested.start {
                return Err(BillingError::Validation(
                    "period_end must be on or after period_start.".to_string(),
                ));
            }
        }

        let lease = self
            .leases
            .find_lease_by_id(lease_id, organization_id)
            .await?
            .ok_or_else(|| BillingError::LeaseNotFound(lease_id.to_string()))?;

        if lease.organization_id != organization_id {
            return Err(BillingError::CrossOrganization {
                lease_id: lease.id.clone(),
            });
        }
        if lease.status != LeaseStatus::Active {
            return Err(BillingError::InactiveLease {
                lease_id: lease.id.clone(),
                status: lease.status.as_str().to_string(),
            });
        }

        let today = Utc::now().date_naive();

        // Manually composed invoices share the pipeline but skip proration
        // and the duplicate check entirely.
        let custom_items = custom_items.filter(|items| !items.is_empty());
        if let Some(items) = custom_items {
            let requested = period.unwrap_or_else(|| aligned_period(lease.billing_cycle, today));
            let subtotal = items_subtotal(&items);
            let invoice = self
                .invoices
                .create_invoice(NewInvoice {
                    organization_id: lease.organization_id.clone(),
                    lease_id: lease.id.clone(),
                    tenant_id: lease.tenant_id.clone(),
                    unit_id: lease.unit_id.clone(),
                    period_start: requested.start,
                    period_end: requested.end,
                    issue_date: today,
                    due_date: resolve_due_date(today, lease.due_day),
                    items,
                    subtotal,
                    tax: 0.0,
                    total: subtotal,
                    currency: lease.currency.clone(),
                    status: InvoiceStatus::Draft,
                })
                .await?;
            return Ok(invoice);
        }

        let requested = period.unwrap_or_else(|| aligned_period(lease.billing_cycle, today));

        // Truncate the period to the lease's active window.
        let mut start = requested.start;
        let mut end = requested.end;
        let mut is_partial = false;
        if lease.starts_on > start {
            start = lease.starts_on;
            is_partial = true;
        }
        if let Some(ends_on) = lease.ends_on {
            if ends_on < end {
                end = ends_on;
                is_partial = true;
            }
        }
        if end < start {
            return Err(BillingError::LeaseNotActiveForPeriod {
                lease_id: lease.id.clone(),
            });
        }

        // Idempotency is checked against the truncated window, because that
        // is what gets persisted; a partial period must stay idempotent on
        // re-runs too.
        if !skip_duplicate_check
            && self
                .invoice_exists_for_period(&lease.id, organization_id, BillingPeriod::new(start, end))
                .await?
        {
            return Err(BillingError::DuplicateInvoice {
                lease_id: lease.id.clone(),
                period_start: start,
                period_end: end,
            });
        }

        // Proration denominator is the full cycle length measured from the
        // untruncated period start.
        let total_days = cycle_length_days(lease.billing_cycle, requested.start);
        let actual_days = days_covered(start, end);
        let items = build_invoice_items(&lease, total_days, actual_days, is_partial);
        let subtotal = items_subtotal(&items);
        let tax = round2(subtotal * self.tax_rate);
        let total = round2(subtotal + tax);

        let invoice = self
            .invoices
            .create_invoice(NewInvoice {
                organization_id: lease.organization_id.clone(),
                lease_id: lease.id.clone(),
                tenant_id: lease.tenant_id.clone(),
                unit_id: lease.unit_id.clone(),
                period_start: start,
                period_end: end,
                issue_date: today,
                due_date: resolve_due_date(today, lease.due_day),
                items,
                subtotal,
                tax,
                total,
                currency: lease.currency.clone(),
                status: InvoiceStatus::Draft,
            })
            .await?;

        tracing::info!(
            lease_id = %invoice.lease_id,
            invoice_id = %invoice.id,
            period_start = %invoice.period_start,
            period_end = %invoice.period_end,
            total = invoice.total,
            "Invoice generated"
        );

        Ok(invoice)
    }

    /// Fast-path idempotency guard: exact match on the period boundaries.
    /// The store's uniqueness mapping remains the authoritative guarantee
    /// under concurrent writers.
    async fn invoice_exists_for_period(
        &self,
        lease_id: &str,
        organization_id: &str,
        period: BillingPeriod,
    ) -> Result<bool, BillingError> {
        let existing = self
            .invoices
            .find_invoices_by_lease(lease_id, organization_id)
            .await?;
        Ok(existing
            .iter()
            .any(|invoice| invoice.period_start == period.start && invoice.period_end == period.end))
    }

    pub async fn find_invoice(
        &self,
        invoice_id: &str,
        organization_id: &str,
    ) -> Result<Option<Invoice>, BillingError> {
        self.invoices
            .find_invoice_by_id(invoice_id, organization_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::billing::charges::{AdditionalCharge, ChargeFrequency, InvoiceItemType};
    use crate::billing::testing::{engine_with, lease, EngineFixture};

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn full_april() -> BillingPeriod {
        BillingPeriod::new(date("2024-04-01"), date("2024-04-30"))
    }

    #[tokio::test]
    async fn generates_single_rent_invoice_for_full_period() {
        let fixture = EngineFixture::with_leases(vec![lease("lease-1", "org-1", 5000.0)]);
        let engine = engine_with(&fixture);

        let invoice = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await
            .expect("invoice created");

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].description, "Monthly Rent");
        assert_eq!(invoice.items[0].amount, 5000.0);
        assert_eq!(invoice.subtotal, 5000.0);
        assert_eq!(invoice.total, 5000.0);
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.total, invoice.subtotal + invoice.tax);
    }

    #[tokio::test]
    async fn prorates_when_lease_starts_mid_period() {
        let mut mid_month = lease("lease-1", "org-1", 3000.0);
        mid_month.starts_on = date("2024-04-15");
        let fixture = EngineFixture::with_leases(vec![mid_month]);
        let engine = engine_with(&fixture);

        let invoice = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await
            .expect("invoice created");

        assert_eq!(invoice.period_start, date("2024-04-15"));
        assert_eq!(invoice.period_end, date("2024-04-30"));
        assert_eq!(invoice.items[0].amount, 1600.0);
    }

    #[tokio::test]
    async fn truncates_period_to_lease_end_date() {
        let mut ending = lease("lease-1", "org-1", 3000.0);
        ending.ends_on = Some(date("2024-04-20"));
        let fixture = EngineFixture::with_leases(vec![ending]);
        let engine = engine_with(&fixture);

        let invoice = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await
            .expect("invoice created");

        assert_eq!(invoice.period_end, date("2024-04-20"));
        // 20 of 30 days covered.
        assert_eq!(invoice.items[0].amount, 2000.0);
    }

    #[tokio::test]
    async fn rejects_second_invoice_for_same_period() {
        let fixture = EngineFixture::with_leases(vec![lease("lease-1", "org-1", 5000.0)]);
        let engine = engine_with(&fixture);

        engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await
            .expect("first invoice created");
        let second = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await;

        assert!(matches!(
            second,
            Err(BillingError::DuplicateInvoice { .. })
        ));
        assert_eq!(fixture.invoices.created_count(), 1);
    }

    #[tokio::test]
    async fn rejects_unknown_lease() {
        let fixture = EngineFixture::with_leases(Vec::new());
        let engine = engine_with(&fixture);

        let result = engine
            .generate_invoice_for_lease("missing", "org-1", Some(full_april()), None)
            .await;

        assert!(matches!(result, Err(BillingError::LeaseNotFound(_))));
    }

    #[tokio::test]
    async fn rejects_cross_organization_request() {
        let fixture = EngineFixture::with_leases(vec![lease("lease-1", "org-2", 5000.0)]);
        let engine = engine_with(&fixture);

        let result = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await;

        assert!(matches!(
            result,
            Err(BillingError::CrossOrganization { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_inactive_lease() {
        let mut terminated = lease("lease-1", "org-1", 5000.0);
        terminated.status = LeaseStatus::Terminated;
        let fixture = EngineFixture::with_leases(vec![terminated]);
        let engine = engine_with(&fixture);

        let result = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await;

        assert!(matches!(result, Err(BillingError::InactiveLease { .. })));
    }

    #[tokio::test]
    async fn rejects_period_outside_lease_window() {
        let mut future = lease("lease-1", "org-1", 5000.0);
        future.starts_on = date("2024-06-01");
        let fixture = EngineFixture::with_leases(vec![future]);
        let engine = engine_with(&fixture);

        let result = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await;

        assert!(matches!(
            result,
            Err(BillingError::LeaseNotActiveForPeriod { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_inverted_period() {
        let fixture = EngineFixture::with_leases(vec![lease("lease-1", "org-1", 5000.0)]);
        let engine = engine_with(&fixture);

        let result = engine
            .generate_invoice_for_lease(
                "lease-1",
                "org-1",
                Some(BillingPeriod::new(date("2024-04-30"), date("2024-04-01"))),
                None,
            )
            .await;

        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn custom_items_bypass_proration_and_duplicate_check() {
        let mut mid_month = lease("lease-1", "org-1", 3000.0);
        mid_month.starts_on = date("2024-04-15");
        let fixture = EngineFixture::with_leases(vec![mid_month]);
        let engine = engine_with(&fixture);

        let items = vec![InvoiceItem {
            description: "Lock change".to_string(),
            amount: 450.0,
            item_type: InvoiceItemType::Charge,
        }];
        let invoice = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), Some(items.clone()))
            .await
            .expect("invoice created");

        assert_eq!(invoice.items[0].description, "Lock change");
        assert_eq!(invoice.items[0].amount, 450.0);
        assert_eq!(invoice.tax, 0.0);
        assert_eq!(invoice.total, 450.0);
        // The given period is used verbatim, untruncated.
        assert_eq!(invoice.period_start, date("2024-04-01"));

        let again = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), Some(items))
            .await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn applies_configured_tax_rate() {
        let fixture = EngineFixture::with_leases(vec![lease("lease-1", "org-1", 1000.0)]);
        let mut engine = engine_with(&fixture);
        engine.tax_rate = 0.19;

        let invoice = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await
            .expect("invoice created");

        assert_eq!(invoice.subtotal, 1000.0);
        assert_eq!(invoice.tax, 190.0);
        assert_eq!(invoice.total, 1190.0);
    }

    #[tokio::test]
    async fn recurring_generation_skips_one_time_charges() {
        let mut with_charges = lease("lease-1", "org-1", 5000.0);
        with_charges.additional_charges = vec![
            AdditionalCharge {
                name: "Deposit top-up".to_string(),
                amount: 900.0,
                frequency: ChargeFrequency::OneTime,
            },
            AdditionalCharge {
                name: "Parking".to_string(),
                amount: 300.0,
                frequency: ChargeFrequency::Monthly,
            },
        ];
        let fixture = EngineFixture::with_leases(vec![with_charges]);
        let engine = engine_with(&fixture);

        let invoice = engine
            .generate_invoice_for_lease("lease-1", "org-1", Some(full_april()), None)
            .await
            .expect("invoice created");

        assert_eq!(invoice.items.len(), 2);
        assert!(invoice
            .items
            .iter()
            .all(|item| item.description != "Deposit top-up"));
        assert_eq!(invoice.subtotal, 5300.0);
    }
}
