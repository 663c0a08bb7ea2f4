use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Party name whose entries the cashbook groups into a collapsible sub-ledger.
pub const CASH_SALES_PARTY: &str = "CASH SALES";

/// Direction of a cashbook voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherKind {
    /// Money in.
    Receipt,
    /// Money out.
    Payment,
}

/// A cashbook row as the backend returns it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherRecord {
    pub id: i64,
    pub created_at: String,
    pub party_name: String,
    pub remarks: Option<String>,
    pub amount: Decimal,
    pub voucher_type: String,
}

/// A validated cashbook entry.
///
/// `amount` is always positive; the direction lives in `kind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoucherEntry {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub party: String,
    pub remarks: Option<String>,
    pub amount: Decimal,
    pub kind: VoucherKind,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoucherError {
    #[error("unparseable timestamp {0:?}")]
    BadTimestamp(String),
    #[error("unknown voucher type {0:?}")]
    BadKind(String),
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("party name is empty")]
    EmptyParty,
}

impl Serialize for VoucherError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl VoucherEntry {
    /// Calendar day the entry belongs to (the naive timestamp's date, no
    /// time-zone conversion).
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Amount with the voucher direction applied: receipts positive,
    /// payments negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            VoucherKind::Receipt => self.amount,
            VoucherKind::Payment => -self.amount,
        }
    }

    /// Whether the entry belongs to the given aggregate party.
    /// Party names compare trimmed and case-insensitively.
    pub fn belongs_to(&self, party: &str) -> bool {
        self.party.trim().to_lowercase() == party.trim().to_lowercase()
    }
}

impl TryFrom<VoucherRecord> for VoucherEntry {
    type Error = VoucherError;

    /// Fails on an unparseable timestamp, an unknown voucher type, a
    /// non-positive amount or an empty party name.
    fn try_from(record: VoucherRecord) -> Result<Self, Self::Error> {
        let timestamp = parse_backend_timestamp(&record.created_at)
            .ok_or_else(|| VoucherError::BadTimestamp(record.created_at.clone()))?;

        let kind = match record.voucher_type.trim().to_lowercase().as_str() {
            "receipt" => VoucherKind::Receipt,
            "payment" => VoucherKind::Payment,
            _ => return Err(VoucherError::BadKind(record.voucher_type)),
        };

        if record.amount <= Decimal::ZERO {
            return Err(VoucherError::NonPositiveAmount(record.amount));
        }
        if record.party_name.trim().is_empty() {
            return Err(VoucherError::EmptyParty);
        }

        Ok(VoucherEntry {
            id: record.id,
            timestamp,
            party: record.party_name,
            remarks: record.remarks,
            amount: record.amount,
            kind,
        })
    }
}

/// Parse the timestamp layouts the backend is known to emit: RFC 3339,
/// Postgres text timestamps with or without fractional seconds, and bare
/// dates (taken as midnight). Offsets are not converted; the wall-clock
/// time as written is kept.
pub(crate) fn parse_backend_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(chrono::NaiveTime::MIN));
    }

    None
}
