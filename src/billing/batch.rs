use chrono::Utc;
use tracing::{info, warn};

use crate::billing::cycle::{aligned_period, BillingCycle, BillingPeriod};
use crate::billing::engine::InvoiceEngine;
use crate::billing::error::BillingError;
use crate::billing::types::{
    GenerationResult, Organization, OrgRunSummary, SendInvoiceRequest,
};

/// Options for the scheduled multi-tenant run.
#[derive(Debug, Clone)]
pub struct MonthlyRunOptions {
    pub organization_id: Option<String>,
    pub period: Option<BillingPeriod>,
    pub auto_send: bool,
    pub force_regenerate: bool,
}

impl Default for MonthlyRunOptions {
    fn default() -> Self {
        Self {
            organization_id: None,
            period: None,
            auto_send: true,
            force_regenerate: false,
        }
    }
}

impl InvoiceEngine {
    /// Generate invoices for every active lease of one organization. Each
    /// lease is an isolated fold step: a failure becomes its
    /// `GenerationResult` and the loop continues. Only organization-level
    /// resolution failures surface as errors.
    pub async fn generate_invoices_for_leases(
        &self,
        organization_id: &str,
        period: BillingPeriod,
        force_regenerate: bool,
    ) -> Result<Vec<GenerationResult>, BillingError> {
        if period.end < period.start {
            return Err(BillingError::Validation(
                "period_end must be on or after period_start.".to_string(),
            ));
        }

        let leases = self.leases.list_active_leases(organization_id).await?;

        let mut results = Vec::with_capacity(leases.len());
        for lease in &leases {
            let outcome = self
                .generate_with_options(&lease.id, organization_id, Some(period), None, force_regenerate)
                .await;
            results.push(match outcome {
                Ok(invoice) => GenerationResult {
                    lease_id: lease.id.clone(),
                    invoice_id: Some(invoice.id),
                    success: true,
                    error: None,
                },
                Err(error) => {
                    warn!(lease_id = %lease.id, %error, "Invoice generation failed for lease");
                    GenerationResult {
                        lease_id: lease.id.clone(),
                        invoice_id: None,
                        success: false,
                        error: Some(error.to_string()),
                    }
                }
            });
        }

        Ok(results)
    }

    /// Scheduled multi-tenant path: resolve the target organizations, run
    /// the per-lease batch for each, and (optionally) dispatch each created
    /// invoice to its tenant. One organization's failure never stops the
    /// others; dispatch failures only increment `sent_errors`.
    pub async fn run_monthly_invoice_generation(
        &self,
        options: MonthlyRunOptions,
    ) -> Result<Vec<OrgRunSummary>, BillingError> {
        let organizations = match options.organization_id.as_deref() {
            Some(organization_id) => {
                let organization = self
                    .organizations
                    .find_organization_by_id(organization_id)
                    .await?
                    .ok_or_else(|| {
                        BillingError::OrganizationNotFound(organization_id.to_string())
                    })?;
                vec![organization]
            }
            None => self.organizations.list_active_organizations().await?,
        };

        let period = options
            .period
            .unwrap_or_else(|| aligned_period(BillingCycle::Monthly, Utc::now().date_naive()));

        let mut summaries = Vec::with_capacity(organizations.len());
        for organization in &organizations {
            summaries.push(self.run_for_organization(organization, period, &options).await);
        }
        Ok(summaries)
    }

    async fn run_for_organization(
        &self,
        organization: &Organization,
        period: BillingPeriod,
        options: &MonthlyRunOptions,
    ) -> OrgRunSummary {
        let results = match self
            .generate_invoices_for_leases(&organization.id, period, options.force_regenerate)
            .await
        {
            Ok(results) => results,
            Err(error) => {
                warn!(
                    organization_id = %organization.id,
                    %error,
                    "Invoice run failed for organization"
                );
                return OrgRunSummary {
                    organization_id: organization.id.clone(),
                    organization_name: organization.name.clone(),
                    total: 0,
                    successful: 0,
                    failed: 0,
                    sent: 0,
                    sent_errors: 0,
                    error: Some(error.to_string()),
                };
            }
        };

        let total = results.len() as u32;
        let successful = results.iter().filter(|result| result.success).count() as u32;
        let failed = total - successful;

        let mut sent = 0u32;
        let mut sent_errors = 0u32;
        if options.auto_send {
            for result in results.iter().filter(|result| result.success) {
                let Some(invoice_id) = result.invoice_id.as_deref() else {
                    continue;
                };
                match self.invoices.find_invoice_by_id(invoice_id, &organization.id).await {
                    Ok(Some(invoice)) => {
                        let outcome = self
                            .dispatcher
                            .send_invoice_to_tenant(SendInvoiceRequest {
                                invoice_id: invoice.id.clone(),
                                organization_id: organization.id.clone(),
                                tenant_id: invoice.tenant_id.clone(),
                                channels: vec!["whatsapp".to_string()],
                            })
                            .await;
                        if outcome.success {
                            sent += 1;
                        } else {
                            sent_errors += 1;
                            warn!(
                                invoice_id = %invoice.id,
                                errors = ?outcome.errors,
                                "Invoice dispatch failed"
                            );
                        }
                    }
                    Ok(None) => {
                        sent_errors += 1;
                    }
                    Err(error) => {
                        sent_errors += 1;
                        warn!(invoice_id, %error, "Could not load invoice for dispatch");
                    }
                }
            }
        }

        info!(
            organization_id = %organization.id,
            total,
            successful,
            failed,
            sent,
            sent_errors,
            "Invoice run completed for organization"
        );

        OrgRunSummary {
            organization_id: organization.id.clone(),
            organization_name: organization.name.clone(),
            total,
            successful,
            failed,
            sent,
            sent_errors,
            error: None,
        }
    }
}
