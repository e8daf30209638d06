//! In-memory fakes for the collaborator traits, shared by the engine and
//! batch tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::billing::cycle::BillingCycle;
use crate::billing::engine::InvoiceEngine;
use crate::billing::error::BillingError;
use crate::billing::ports::{
    InvoiceStore, LeaseRepository, NotificationDispatcher, OrganizationRegistry,
};
use crate::billing::types::{
    DispatchOutcome, Invoice, Lease, LeaseStatus, NewInvoice, Organization, SendInvoiceRequest,
};

pub fn lease(id: &str, organization_id: &str, rent_amount: f64) -> Lease {
    Lease {
        id: id.to_string(),
        organization_id: organization_id.to_string(),
        tenant_id: format!("{id}-tenant"),
        unit_id: format!("{id}-unit"),
        billing_cycle: BillingCycle::Monthly,
        due_day: 5,
        rent_amount,
        currency: "COP".to_string(),
        additional_charges: Vec::new(),
        starts_on: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        ends_on: None,
        status: LeaseStatus::Active,
    }
}

pub struct FakeLeaseRepository {
    leases: Vec<Lease>,
    failing_orgs: Mutex<HashSet<String>>,
}

impl FakeLeaseRepository {
    pub fn new(leases: Vec<Lease>) -> Self {
        Self {
            leases,
            failing_orgs: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_listing_for(&self, organization_id: &str) {
        self.failing_orgs
            .lock()
            .expect("lock poisoned")
            .insert(organization_id.to_string());
    }
}

#[async_trait]
impl LeaseRepository for FakeLeaseRepository {
    async fn list_active_leases(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Lease>, BillingError> {
        if self
            .failing_orgs
            .lock()
            .expect("lock poisoned")
            .contains(organization_id)
        {
            return Err(BillingError::Store("lease listing unavailable".to_string()));
        }
        Ok(self
            .leases
            .iter()
            .filter(|lease| {
                lease.organization_id == organization_id && lease.status == LeaseStatus::Active
            })
            .cloned()
            .collect())
    }

    async fn find_lease_by_id(
        &self,
        lease_id: &str,
        _organization_id: &str,
    ) -> Result<Option<Lease>, BillingError> {
        Ok(self.leases.iter().find(|lease| lease.id == lease_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeInvoiceStore {
    invoices: Mutex<Vec<Invoice>>,
}

impl FakeInvoiceStore {
    pub fn created_count(&self) -> usize {
        self.invoices.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl InvoiceStore for FakeInvoiceStore {
    async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, BillingError> {
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            organization_id: input.organization_id,
            lease_id: input.lease_id,
            tenant_id: input.tenant_id,
            unit_id: input.unit_id,
            period_start: input.period_start,
            period_end: input.period_end,
            issue_date: input.issue_date,
            due_date: input.due_date,
            items: input.items,
            subtotal: input.subtotal,
            tax: input.tax,
            total: input.total,
            currency: input.currency,
            status: input.status,
        };
        self.invoices
            .lock()
            .expect("lock poisoned")
            .push(invoice.clone());
        Ok(invoice)
    }

    async fn find_invoices_by_lease(
        &self,
        lease_id: &str,
        organization_id: &str,
    ) -> Result<Vec<Invoice>, BillingError> {
        Ok(self
            .invoices
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|invoice| {
                invoice.lease_id == lease_id && invoice.organization_id == organization_id
            })
            .cloned()
            .collect())
    }

    async fn find_invoice_by_id(
        &self,
        invoice_id: &str,
        organization_id: &str,
    ) -> Result<Option<Invoice>, BillingError> {
        Ok(self
            .invoices
            .lock()
            .expect("lock poisoned")
            .iter()
            .find(|invoice| {
                invoice.id == invoice_id && invoice.organization_id == organization_id
            })
            .cloned())
    }
}

pub struct FakeOrganizationRegistry {
    organizations: Vec<Organization>,
}

#[async_trait]
impl OrganizationRegistry for FakeOrganizationRegistry {
    async fn list_active_organizations(&self) -> Result<Vec<Organization>, BillingError> {
        Ok(self.organizations.clone())
    }

    async fn find_organization_by_id(
        &self,
        organization_id: &str,
    ) -> Result<Option<Organization>, BillingError> {
        Ok(self
            .organizations
            .iter()
            .find(|organization| organization.id == organization_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct FakeDispatcher {
    fail: AtomicBool,
    sent: Mutex<Vec<SendInvoiceRequest>>,
}

impl FakeDispatcher {
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl NotificationDispatcher for FakeDispatcher {
    async fn send_invoice_to_tenant(&self, request: SendInvoiceRequest) -> DispatchOutcome {
        if self.fail.load(Ordering::SeqCst) {
            return DispatchOutcome::failed(vec!["dispatch disabled".to_string()]);
        }
        self.sent.lock().expect("lock poisoned").push(request);
        DispatchOutcome::ok()
    }
}

pub struct EngineFixture {
    pub leases: Arc<FakeLeaseRepository>,
    pub invoices: Arc<FakeInvoiceStore>,
    pub organizations: Arc<FakeOrganizationRegistry>,
    pub dispatcher: Arc<FakeDispatcher>,
}

impl EngineFixture {
    /// Build a fixture whose organizations are derived from the lease set,
    /// in order of first appearance.
    pub fn with_leases(leases: Vec<Lease>) -> Self {
        let mut organizations: Vec<Organization> = Vec::new();
        for lease in &leases {
            if organizations
                .iter()
                .all(|organization| organization.id != lease.organization_id)
            {
                organizations.push(Organization {
                    id: lease.organization_id.clone(),
                    name: format!("{} S.A.S.", lease.organization_id),
                    status: Some("active".to_string()),
                });
            }
        }
        Self {
            leases: Arc::new(FakeLeaseRepository::new(leases)),
            invoices: Arc::new(FakeInvoiceStore::default()),
            organizations: Arc::new(FakeOrganizationRegistry { organizations }),
            dispatcher: Arc::new(FakeDispatcher::default()),
        }
    }
}

pub fn engine_with(fixture: &EngineFixture) -> InvoiceEngine {
    InvoiceEngine::new(
        fixture.leases.clone(),
        fixture.invoices.clone(),
        fixture.organizations.clone(),
        fixture.dispatcher.clone(),
        0.0,
    )
}
