use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::normalized;
use crate::invoice::{Invoice, PaymentSplit};

/// An invoice whose stored total and payment split disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitMismatch {
    pub invoice_id: i64,
    /// Stored total minus the split; positive means money not covered by
    /// any payment mode.
    pub difference: Decimal,
}

/// Headline sales figures over a set of invoices. Revenue comes from the
/// stored invoice totals, not from re-summing line items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_revenue: Decimal,
    pub invoice_count: usize,
    /// Revenue per invoice, absent when there are no invoices.
    pub average_sale: Option<Decimal>,
    pub units_sold: Decimal,
    pub payments: PaymentSplit,
    /// Invoices whose payment split does not add up to their total. Noted
    /// for review, the invoices still count above.
    pub split_mismatches: Vec<SplitMismatch>,
}

impl SalesSummary {
    pub fn compute(invoices: &[Invoice]) -> SalesSummary {
        let mut total_revenue = Decimal::ZERO;
        let mut units_sold = Decimal::ZERO;
        let mut payments = PaymentSplit::default();
        let mut split_mismatches = Vec::new();

        for invoice in invoices {
            total_revenue += invoice.total;
            units_sold += invoice.units();
            payments += &invoice.payments;
            if let Some(difference) = invoice.split_mismatch() {
                split_mismatches.push(SplitMismatch {
                    invoice_id: invoice.id,
                    difference,
                });
            }
        }

        let invoice_count = invoices.len();
        let average_sale =
            (invoice_count > 0).then(|| total_revenue / Decimal::from(invoice_count));

        SalesSummary {
            total_revenue,
            invoice_count,
            average_sale,
            units_sold,
            payments,
            split_mismatches,
        }
    }
}

/// A customer ranked by how much they bought.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerActivity {
    pub name: String,
    pub purchases: usize,
    pub amount: Decimal,
}

/// Best-selling products by units, at most `count` of them. Names are
/// matched case-insensitively; the first spelling seen is kept.
pub fn top_products(invoices: &[Invoice], count: usize) -> Vec<(String, Decimal)> {
    let mut units: HashMap<String, (String, Decimal)> = HashMap::new();
    for invoice in invoices {
        for item in &invoice.items {
            let (_, total) = units
                .entry(normalized(&item.name))
                .or_insert_with(|| (item.name.trim().to_string(), Decimal::ZERO));
            *total += item.quantity;
        }
    }

    let mut rows: Vec<(String, Decimal)> = units.into_values().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(count);
    rows
}

/// Customers ranked by amount bought, at most `count` of them. Invoices
/// without a customer name are left out.
pub fn top_customers(invoices: &[Invoice], count: usize) -> Vec<CustomerActivity> {
    let mut customers: HashMap<String, CustomerActivity> = HashMap::new();
    for invoice in invoices {
        let name = invoice.customer_name.trim();
        if name.is_empty() {
            continue;
        }
        let row = customers
            .entry(name.to_lowercase())
            .or_insert_with(|| CustomerActivity {
                name: name.to_string(),
                purchases: 0,
                amount: Decimal::ZERO,
            });
        row.purchases += 1;
        row.amount += invoice.total;
    }

    let mut rows: Vec<CustomerActivity> = customers.into_values().collect();
    rows.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.name.cmp(&b.name)));
    rows.truncate(count);
    rows
}

/// The latest invoices, newest first, at most `count` of them.
pub fn recent_sales(invoices: &[Invoice], count: usize) -> Vec<&Invoice> {
    let mut rows: Vec<&Invoice> = invoices.iter().collect();
    rows.sort_by_key(|invoice| std::cmp::Reverse((invoice.date, invoice.id)));
    rows.truncate(count);
    rows
}

/// Stored invoice totals summed per calendar day, in date order.
pub fn daily_revenue(invoices: &[Invoice]) -> Vec<(NaiveDate, Decimal)> {
    let mut days: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for invoice in invoices {
        *days.entry(invoice.date.date()).or_default() += invoice.total;
    }
    days.into_iter().collect()
}
