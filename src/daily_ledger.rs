use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::voucher::{VoucherEntry, VoucherError, VoucherKind, VoucherRecord, CASH_SALES_PARTY};

/// How the cash-sales sub-ledger is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashSalesView {
    /// One aggregate line per day.
    Collapsed,
    /// Every cash-sales entry inline, in time order.
    Expanded,
}

/// One calendar day of the cashbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    /// Entries outside the cash-sales party, in time order.
    pub entries: Vec<VoucherEntry>,
    /// Cash-sales entries of the day, in time order.
    pub cash_sales: Vec<VoucherEntry>,
    pub opening_balance: Decimal,
    pub total_receipts: Decimal,
    pub total_payments: Decimal,
    pub closing_balance: Decimal,
}

/// A presentable cashbook row with its running balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LedgerRow {
    Entry {
        entry: VoucherEntry,
        balance: Decimal,
    },
    CashSales {
        receipts: Decimal,
        payments: Decimal,
        balance: Decimal,
    },
}

impl LedgerRow {
    /// Running balance after this row.
    pub fn balance(&self) -> Decimal {
        match self {
            LedgerRow::Entry { balance, .. } => *balance,
            LedgerRow::CashSales { balance, .. } => *balance,
        }
    }
}

impl DayGroup {
    /// Rows of the day with running balances. The last row's balance equals
    /// `closing_balance` in either view.
    pub fn rows(&self, view: CashSalesView) -> Vec<LedgerRow> {
        let mut rows = Vec::new();
        let mut balance = self.opening_balance;

        match view {
            CashSalesView::Collapsed => {
                for entry in &self.entries {
                    balance += entry.signed_amount();
                    rows.push(LedgerRow::Entry {
                        entry: entry.clone(),
                        balance,
                    });
                }
                if !self.cash_sales.is_empty() {
                    let (receipts, payments) = self.cash_sales_totals();
                    balance += receipts - payments;
                    rows.push(LedgerRow::CashSales {
                        receipts,
                        payments,
                        balance,
                    });
                }
            }
            CashSalesView::Expanded => {
                let mut merged: Vec<&VoucherEntry> =
                    self.entries.iter().chain(&self.cash_sales).collect();
                merged.sort_by_key(|entry| (entry.timestamp, entry.id));
                for entry in merged {
                    balance += entry.signed_amount();
                    rows.push(LedgerRow::Entry {
                        entry: entry.clone(),
                        balance,
                    });
                }
            }
        }

        rows
    }

    /// Receipt and payment totals of the cash-sales sub-ledger.
    pub fn cash_sales_totals(&self) -> (Decimal, Decimal) {
        let mut receipts = Decimal::ZERO;
        let mut payments = Decimal::ZERO;
        for entry in &self.cash_sales {
            match entry.kind {
                VoucherKind::Receipt => receipts += entry.amount,
                VoucherKind::Payment => payments += entry.amount,
            }
        }
        (receipts, payments)
    }
}

/// A backend row that failed validation and was left out of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedVoucher {
    pub id: i64,
    pub reason: VoucherError,
}

/// The cashbook: day groups in chronological order, with the running
/// balance carried from each day's close to the next day's open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLedger {
    pub days: Vec<DayGroup>,
    /// Rows that failed validation, reported instead of aborting.
    pub skipped: Vec<SkippedVoucher>,
}

impl DailyLedger {
    /// Groups entries by calendar day and threads the running balance
    /// through, starting from zero. Entries of `cash_sales_party` land in
    /// each day's sub-ledger but still count towards the day totals.
    pub fn compute(entries: Vec<VoucherEntry>, cash_sales_party: &str) -> DailyLedger {
        let mut by_day: BTreeMap<NaiveDate, Vec<VoucherEntry>> = BTreeMap::new();
        for entry in entries {
            by_day.entry(entry.date()).or_default().push(entry);
        }

        let mut days = Vec::with_capacity(by_day.len());
        let mut balance = Decimal::ZERO;

        for (date, mut bucket) in by_day {
            bucket.sort_by_key(|entry| (entry.timestamp, entry.id));

            let mut entries = Vec::new();
            let mut cash_sales = Vec::new();
            let mut total_receipts = Decimal::ZERO;
            let mut total_payments = Decimal::ZERO;

            for entry in bucket {
                match entry.kind {
                    VoucherKind::Receipt => total_receipts += entry.amount,
                    VoucherKind::Payment => total_payments += entry.amount,
                }
                if entry.belongs_to(cash_sales_party) {
                    cash_sales.push(entry);
                } else {
                    entries.push(entry);
                }
            }

            let opening_balance = balance;
            balance += total_receipts - total_payments;

            days.push(DayGroup {
                date,
                entries,
                cash_sales,
                opening_balance,
                total_receipts,
                total_payments,
                closing_balance: balance,
            });
        }

        DailyLedger {
            days,
            skipped: Vec::new(),
        }
    }

    /// Validates raw backend rows and builds the ledger from the good ones.
    /// Malformed rows are logged, counted in `skipped` and never abort the
    /// report.
    pub fn from_records(records: Vec<VoucherRecord>, cash_sales_party: &str) -> DailyLedger {
        let mut entries = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for record in records {
            let id = record.id;
            match VoucherEntry::try_from(record) {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    warn!(voucher_id = id, %reason, "skipping malformed cashbook record");
                    skipped.push(SkippedVoucher { id, reason });
                }
            }
        }

        let mut ledger = DailyLedger::compute(entries, cash_sales_party);
        ledger.skipped = skipped;
        ledger
    }

    /// Closing balance after the last day, zero for an empty ledger.
    pub fn closing_balance(&self) -> Decimal {
        self.days
            .last()
            .map_or(Decimal::ZERO, |day| day.closing_balance)
    }
}

impl From<Vec<VoucherEntry>> for DailyLedger {
    fn from(entries: Vec<VoucherEntry>) -> Self {
        DailyLedger::compute(entries, CASH_SALES_PARTY)
    }
}
