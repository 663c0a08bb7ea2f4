use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

use crate::catalog::{Product, ProductCatalog, Supplier};
use crate::daily_ledger::DailyLedger;
use crate::invoice::{decode_invoices, InvoiceRecord, SkippedInvoice};
use crate::period::{filter_invoices, ReportPeriod};
use crate::profitability::ProfitabilityReport;
use crate::sales_summary::SalesSummary;
use crate::voucher::VoucherRecord;

/// A fetch from the backing store failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend request failed: {0}")]
pub struct BackendError(pub String);

/// Data access the reports need. Implementations talk to whatever holds
/// the books; [`MemoryBackend`] serves tests and offline imports.
pub trait Backend {
    fn fetch_vouchers(&self) -> Result<Vec<VoucherRecord>, BackendError>;
    fn fetch_invoices(&self) -> Result<Vec<InvoiceRecord>, BackendError>;
    fn fetch_products(&self) -> Result<Vec<Product>, BackendError>;
    fn fetch_suppliers(&self) -> Result<Vec<Supplier>, BackendError>;
}

/// A backend over rows already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pub vouchers: Vec<VoucherRecord>,
    pub invoices: Vec<InvoiceRecord>,
    pub products: Vec<Product>,
    pub suppliers: Vec<Supplier>,
}

impl Backend for MemoryBackend {
    fn fetch_vouchers(&self) -> Result<Vec<VoucherRecord>, BackendError> {
        Ok(self.vouchers.clone())
    }

    fn fetch_invoices(&self) -> Result<Vec<InvoiceRecord>, BackendError> {
        Ok(self.invoices.clone())
    }

    fn fetch_products(&self) -> Result<Vec<Product>, BackendError> {
        Ok(self.products.clone())
    }

    fn fetch_suppliers(&self) -> Result<Vec<Supplier>, BackendError> {
        Ok(self.suppliers.clone())
    }
}

/// Fetches the cashbook rows and builds the daily ledger.
pub fn cashbook_report(
    backend: &impl Backend,
    cash_sales_party: &str,
) -> Result<DailyLedger, BackendError> {
    let records = backend.fetch_vouchers()?;
    debug!(records = records.len(), "building cashbook report");
    Ok(DailyLedger::from_records(records, cash_sales_party))
}

/// Fetches invoices and the product catalog and builds the profitability
/// report.
pub fn profitability_report(backend: &impl Backend) -> Result<ProfitabilityReport, BackendError> {
    let records = backend.fetch_invoices()?;
    let catalog = ProductCatalog::new(backend.fetch_products()?, backend.fetch_suppliers()?);
    debug!(records = records.len(), "building profitability report");
    Ok(ProfitabilityReport::from_records(records, &catalog))
}

/// Fetches invoices, keeps those inside the period and summarises them.
/// Rows that failed to decode come back alongside the summary.
pub fn sales_summary_report(
    backend: &impl Backend,
    period: ReportPeriod,
    now: NaiveDateTime,
) -> Result<(SalesSummary, Vec<SkippedInvoice>), BackendError> {
    let (mut invoices, skipped) = decode_invoices(backend.fetch_invoices()?);
    filter_invoices(period, now, &mut invoices);
    debug!(invoices = invoices.len(), ?period, "building sales summary");
    Ok((SalesSummary::compute(&invoices), skipped))
}
