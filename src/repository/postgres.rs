//! Postgres adapters for the billing collaborator traits, built on the
//! generic table service.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

use crate::billing::charges::{AdditionalCharge, ChargeFrequency};
use crate::billing::error::BillingError;
use crate::billing::ports::{InvoiceStore, LeaseRepository, OrganizationRegistry};
use crate::billing::types::{Invoice, Lease, NewInvoice, Organization};
use crate::error::AppError;
use crate::repository::table_service::{create_row, get_row, list_rows};

pub struct PgLeaseRepository {
    pool: PgPool,
}

impl PgLeaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn charges_for_leases(
        &self,
        lease_ids: &[String],
    ) -> Result<HashMap<String, Vec<AdditionalCharge>>, BillingError> {
        if lease_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut filters = Map::new();
        filters.insert(
            "lease_id".to_string(),
            Value::Array(lease_ids.iter().cloned().map(Value::String).collect()),
        );
        let rows = list_rows(
            &self.pool,
            "lease_charges",
            Some(&filters),
            1000,
            0,
            "created_at",
            true,
        )
        .await
        .map_err(store_error)?;

        let mut grouped: HashMap<String, Vec<AdditionalCharge>> = HashMap::new();
        for row in rows {
            let charge: LeaseChargeRow = serde_json::from_value(row)
                .map_err(|error| BillingError::Store(format!("Invalid lease charge record: {error}")))?;
            grouped.entry(charge.lease_id).or_default().push(AdditionalCharge {
                name: charge.name,
                amount: charge.amount,
                frequency: charge.frequency,
            });
        }
        Ok(grouped)
    }
}

#[derive(Debug, serde::Deserialize)]
struct LeaseChargeRow {
    lease_id: String,
    name: String,
    amount: f64,
    frequency: ChargeFrequency,
}

#[async_trait]
impl LeaseRepository for PgLeaseRepository {
    async fn list_active_leases(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Lease>, BillingError> {
        let mut filters = Map::new();
        filters.insert(
            "organization_id".to_string(),
            Value::String(organization_id.to_string()),
        );
        filters.insert("status".to_string(), Value::String("active".to_string()));

        let rows = list_rows(
            &self.pool,
            "leases",
            Some(&filters),
            1000,
            0,
            "created_at",
            true,
        )
        .await
        .map_err(store_error)?;

        let mut leases = rows
            .into_iter()
            .map(parse_lease)
            .collect::<Result<Vec<_>, _>>()?;

        let lease_ids = leases.iter().map(|lease| lease.id.clone()).collect::<Vec<_>>();
        let mut charges = self.charges_for_leases(&lease_ids).await?;
        for lease in &mut leases {
            if let Some(lease_charges) = charges.remove(&lease.id) {
                lease.additional_charges = lease_charges;
            }
        }

        Ok(leases)
    }

    async fn find_lease_by_id(
        &self,
        lease_id: &str,
        _organization_id: &str,
    ) -> Result<Option<Lease>, BillingError> {
        let row = match get_row(&self.pool, "leases", lease_id, "id").await {
            Ok(row) => row,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(error) => return Err(store_error(error)),
        };

        let mut lease = parse_lease(row)?;
        let mut charges = self.charges_for_leases(&[lease.id.clone()]).await?;
        if let Some(lease_charges) = charges.remove(&lease.id) {
            lease.additional_charges = lease_charges;
        }
        Ok(Some(lease))
    }
}

pub struct PgInvoiceStore {
    pool: PgPool,
}

impl PgInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvoiceStore for PgInvoiceStore {
    async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, BillingError> {
        let payload = serde_json::to_value(&input)
            .ok()
            .and_then(|value| value.as_object().cloned())
            .ok_or_else(|| BillingError::Store("Could not serialize invoice.".to_string()))?;

        // The unique index on (lease_id, period_start, period_end) is the
        // authoritative duplicate guard; the engine's pre-check is only a
        // fast path.
        match create_row(&self.pool, "invoices", &payload).await {
            Ok(row) => parse_invoice(row),
            Err(AppError::Conflict(_)) => Err(BillingError::DuplicateInvoice {
                lease_id: input.lease_id,
                period_start: input.period_start,
                period_end: input.period_end,
            }),
            Err(error) => Err(store_error(error)),
        }
    }

    async fn find_invoices_by_lease(
        &self,
        lease_id: &str,
        organization_id: &str,
    ) -> Result<Vec<Invoice>, BillingError> {
        let mut filters = Map::new();
        filters.insert("lease_id".to_string(), Value::String(lease_id.to_string()));
        filters.insert(
            "organization_id".to_string(),
            Value::String(organization_id.to_string()),
        );

        let rows = list_rows(
            &self.pool,
            "invoices",
            Some(&filters),
            1000,
            0,
            "period_start",
            true,
        )
        .await
        .map_err(store_error)?;

        rows.into_iter().map(parse_invoice).collect()
    }

    async fn find_invoice_by_id(
        &self,
        invoice_id: &str,
        organization_id: &str,
    ) -> Result<Option<Invoice>, BillingError> {
        let row = match get_row(&self.pool, "invoices", invoice_id, "id").await {
            Ok(row) => row,
            Err(AppError::NotFound(_)) => return Ok(None),
            Err(error) => return Err(store_error(error)),
        };

        let invoice = parse_invoice(row)?;
        if invoice.organization_id != organization_id {
            return Ok(None);
        }
        Ok(Some(invoice))
    }
}

pub struct PgOrganizationRegistry {
    pool: PgPool,
}

impl PgOrganizationRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRegistry for PgOrganizationRegistry {
    async fn list_active_organizations(&self) -> Result<Vec<Organization>, BillingError> {
        let rows = list_rows(&self.pool, "organizations", None, 500, 0, "created_at", true)
            .await
            .map_err(store_error)?;

        let organizations = rows
            .into_iter()
            .map(parse_organization)
            .collect::<Result<Vec<_>, _>>()?;

        // Organizations with no status are treated as active.
        Ok(organizations
            .into_iter()
            .filter(|organization| {
                organization
                    .status
                    .as_deref()
                    .map(str::trim)
                    .filter(|status| !status.is_empty())
                    .is_none_or(|status| status.eq_ignore_ascii_case("active"))
            })
            .collect())
    }

    async fn find_organization_by_id(
        &self,
        organization_id: &str,
    ) -> Result<Option<Organization>, BillingError> {
        match get_row(&self.pool, "organizations", organization_id, "id").await {
            Ok(row) => parse_organization(row).map(Some),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(error) => Err(store_error(error)),
        }
    }
}

fn parse_lease(row: Value) -> Result<Lease, BillingError> {
    serde_json::from_value(without_nulls(row))
        .map_err(|error| BillingError::Store(format!("Invalid lease record: {error}")))
}

fn parse_invoice(row: Value) -> Result<Invoice, BillingError> {
    serde_json::from_value(without_nulls(row))
        .map_err(|error| BillingError::Store(format!("Invalid invoice record: {error}")))
}

fn parse_organization(row: Value) -> Result<Organization, BillingError> {
    serde_json::from_value(without_nulls(row))
        .map_err(|error| BillingError::Store(format!("Invalid organization record: {error}")))
}

/// `row_to_json` emits explicit nulls for empty columns; dropping them lets
/// the serde defaults on the record types apply.
fn without_nulls(row: Value) -> Value {
    match row {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, value)| !value.is_null())
                .collect(),
        ),
        other => other,
    }
}

fn store_error(error: AppError) -> BillingError {
    BillingError::Store(error.to_string())
}
