use serde::{Deserialize, Serialize};

use crate::billing::cycle::{prorate, BillingCycle};
use crate::billing::types::Lease;

/// How often a recurring lease charge applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargeFrequency {
    OneTime,
    Monthly,
    Quarterly,
    Annually,
}

impl ChargeFrequency {
    pub fn matches_cycle(self, cycle: BillingCycle) -> bool {
        matches!(
            (self, cycle),
            (Self::Monthly, BillingCycle::Monthly)
                | (Self::Quarterly, BillingCycle::Quarterly)
                | (Self::Annually, BillingCycle::Annually)
        )
    }
}

/// Recurring (or one-time) charge attached to a lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub name: String,
    pub amount: f64,
    pub frequency: ChargeFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceItemType {
    Rent,
    Charge,
}

fn default_item_type() -> InvoiceItemType {
    InvoiceItemType::Charge
}

/// One invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub amount: f64,
    #[serde(default = "default_item_type")]
    pub item_type: InvoiceItemType,
}

/// Assemble invoice lines for a lease period: the rent line first, then every
/// additional charge whose frequency matches the lease's billing cycle.
/// One-time charges never enter recurring generation. When the period is
/// partial, every line is prorated by `actual_days / total_days`.
pub fn build_invoice_items(
    lease: &Lease,
    total_days: i64,
    actual_days: i64,
    is_partial: bool,
) -> Vec<InvoiceItem> {
    let mut items = Vec::with_capacity(1 + lease.additional_charges.len());

    let rent = if is_partial {
        prorate(lease.rent_amount, total_days, actual_days)
    } else {
        lease.rent_amount
    };
    items.push(InvoiceItem {
        description: lease.billing_cycle.rent_description().to_string(),
        amount: rent,
        item_type: InvoiceItemType::Rent,
    });

    for charge in &lease.additional_charges {
        if charge.frequency == ChargeFrequency::OneTime {
            continue;
        }
        if !charge.frequency.matches_cycle(lease.billing_cycle) {
            continue;
        }
        let amount = if is_partial {
            prorate(charge.amount, total_days, actual_days)
        } else {
            charge.amount
        };
        items.push(InvoiceItem {
            description: charge.name.clone(),
            amount,
            item_type: InvoiceItemType::Charge,
        });
    }

    items
}

pub fn items_subtotal(items: &[InvoiceItem]) -> f64 {
    round2(items.iter().map(|item| item.amount).sum())
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::billing::types::{Lease, LeaseStatus};

    fn lease_with(charges: Vec<AdditionalCharge>, cycle: BillingCycle) -> Lease {
        Lease {
            id: "lease-1".to_string(),
            organization_id: "org-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            unit_id: "unit-1".to_string(),
            billing_cycle: cycle,
            due_day: 5,
            rent_amount: 5000.0,
            currency: "COP".to_string(),
            additional_charges: charges,
            starts_on: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            ends_on: None,
            status: LeaseStatus::Active,
        }
    }

    #[test]
    fn full_period_yields_single_rent_line() {
        let lease = lease_with(Vec::new(), BillingCycle::Monthly);
        let items = build_invoice_items(&lease, 31, 31, false);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Monthly Rent");
        assert_eq!(items[0].amount, 5000.0);
        assert_eq!(items[0].item_type, InvoiceItemType::Rent);
        assert_eq!(items_subtotal(&items), 5000.0);
    }

    #[test]
    fn partial_period_prorates_every_line() {
        let charges = vec![AdditionalCharge {
            name: "Parking".to_string(),
            amount: 600.0,
            frequency: ChargeFrequency::Monthly,
        }];
        let lease = lease_with(charges, BillingCycle::Monthly);
        let items = build_invoice_items(&lease, 30, 16, true);
        assert_eq!(items[0].amount, 2667.0);
        assert_eq!(items[1].amount, 320.0);
    }

    #[test]
    fn one_time_charges_are_never_included() {
        let charges = vec![
            AdditionalCharge {
                name: "Key replacement".to_string(),
                amount: 150.0,
                frequency: ChargeFrequency::OneTime,
            },
            AdditionalCharge {
                name: "Cleaning".to_string(),
                amount: 200.0,
                frequency: ChargeFrequency::Monthly,
            },
        ];
        let lease = lease_with(charges, BillingCycle::Monthly);
        let items = build_invoice_items(&lease, 31, 31, false);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.description != "Key replacement"));
    }

    #[test]
    fn mismatched_frequency_is_skipped() {
        let charges = vec![AdditionalCharge {
            name: "Annual insurance".to_string(),
            amount: 1200.0,
            frequency: ChargeFrequency::Annually,
        }];
        let lease = lease_with(charges, BillingCycle::Monthly);
        let items = build_invoice_items(&lease, 31, 31, false);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_type, InvoiceItemType::Rent);
    }

    #[test]
    fn quarterly_charge_bills_on_quarterly_lease() {
        let charges = vec![AdditionalCharge {
            name: "Maintenance fund".to_string(),
            amount: 300.0,
            frequency: ChargeFrequency::Quarterly,
        }];
        let lease = lease_with(charges, BillingCycle::Quarterly);
        let items = build_invoice_items(&lease, 91, 91, false);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Quarterly Rent");
        assert_eq!(items[1].amount, 300.0);
    }
}
