pub mod catalog;
pub mod daily_ledger;
pub mod invoice;
pub mod monthly_sales;
pub mod period;
pub mod profitability;
pub mod sales_summary;
pub mod store;
pub mod voucher;

pub use catalog::ProductCatalog;
pub use daily_ledger::{CashSalesView, DailyLedger};
pub use invoice::{Invoice, InvoiceRecord, LineItem};
pub use period::ReportPeriod;
pub use profitability::ProfitabilityReport;
pub use sales_summary::SalesSummary;
pub use voucher::{VoucherEntry, VoucherKind, VoucherRecord, CASH_SALES_PARTY};
