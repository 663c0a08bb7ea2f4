use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::voucher::parse_backend_timestamp;

/// One sold line of an invoice, as embedded in the backend's JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl LineItem {
    pub fn revenue(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// An invoice row as the backend returns it, before validation.
/// The `products` column holds the line items as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub id: i64,
    pub date: String,
    pub customer_name: String,
    pub customer_number: Option<String>,
    pub products: String,
    pub total: Decimal,
    pub note: Option<String>,
    #[serde(default)]
    pub cash: Option<Decimal>,
    #[serde(default)]
    pub upi: Option<Decimal>,
    #[serde(default)]
    pub credit: Option<Decimal>,
}

/// How an invoice total was settled. Missing backend values count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PaymentSplit {
    pub cash: Decimal,
    pub upi: Decimal,
    pub credit: Decimal,
}

impl PaymentSplit {
    pub fn sum(&self) -> Decimal {
        self.cash + self.upi + self.credit
    }
}

impl std::ops::AddAssign<&PaymentSplit> for PaymentSplit {
    fn add_assign(&mut self, other: &PaymentSplit) {
        self.cash += other.cash;
        self.upi += other.upi;
        self.credit += other.credit;
    }
}

/// A validated invoice with its line items decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub date: NaiveDateTime,
    pub customer_name: String,
    pub customer_number: Option<String>,
    pub items: Vec<LineItem>,
    /// Total as stored by the point of sale, which is authoritative for
    /// revenue summaries.
    pub total: Decimal,
    pub note: Option<String>,
    pub payments: PaymentSplit,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("unparseable date {0:?}")]
    BadDate(String),
    #[error("unparseable line items: {0}")]
    BadLineItems(String),
}

impl Serialize for InvoiceError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Invoice {
    /// Revenue summed over the line items. May differ from the stored
    /// `total` when the point of sale applied a rounding or discount.
    pub fn line_revenue(&self) -> Decimal {
        self.items.iter().map(LineItem::revenue).sum()
    }

    /// Units sold across all line items.
    pub fn units(&self) -> Decimal {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Difference between the stored total and the cash/UPI/credit split,
    /// if the two disagree. Positive means part of the total is not
    /// covered by any payment mode.
    pub fn split_mismatch(&self) -> Option<Decimal> {
        let difference = self.total - self.payments.sum();
        (!difference.is_zero()).then_some(difference)
    }
}

impl TryFrom<InvoiceRecord> for Invoice {
    type Error = InvoiceError;

    /// Fails on an unparseable date or an unparseable `products` column.
    fn try_from(record: InvoiceRecord) -> Result<Self, Self::Error> {
        let date = parse_backend_timestamp(&record.date)
            .ok_or_else(|| InvoiceError::BadDate(record.date.clone()))?;
        let items: Vec<LineItem> = serde_json::from_str(&record.products)
            .map_err(|err| InvoiceError::BadLineItems(err.to_string()))?;

        Ok(Invoice {
            id: record.id,
            date,
            customer_name: record.customer_name,
            customer_number: record.customer_number,
            items,
            total: record.total,
            note: record.note,
            payments: PaymentSplit {
                cash: record.cash.unwrap_or(Decimal::ZERO),
                upi: record.upi.unwrap_or(Decimal::ZERO),
                credit: record.credit.unwrap_or(Decimal::ZERO),
            },
        })
    }
}

/// An invoice row that failed validation and was left out of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedInvoice {
    pub id: i64,
    pub reason: InvoiceError,
}

/// Validates raw backend rows. Malformed rows are logged and reported
/// alongside the good ones, never aborting the whole batch.
pub fn decode_invoices(records: Vec<InvoiceRecord>) -> (Vec<Invoice>, Vec<SkippedInvoice>) {
    let mut invoices = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for record in records {
        let id = record.id;
        match Invoice::try_from(record) {
            Ok(invoice) => invoices.push(invoice),
            Err(reason) => {
                warn!(invoice_id = id, %reason, "skipping malformed invoice");
                skipped.push(SkippedInvoice { id, reason });
            }
        }
    }

    (invoices, skipped)
}
