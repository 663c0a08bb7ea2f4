use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{normalized, ProductCatalog};
use crate::invoice::{decode_invoices, Invoice, InvoiceRecord, SkippedInvoice};

/// Fallback margin, in percent, for estimating costs when no matched sale
/// provides an average.
pub const DEFAULT_AVERAGE_MARGIN: Decimal = Decimal::from_parts(20, 0, 0, false, 0);

/// Profit as a percentage of revenue. Undefined when revenue is zero.
pub fn margin(profit: Decimal, revenue: Decimal) -> Option<Decimal> {
    (!revenue.is_zero()).then(|| profit / revenue * Decimal::ONE_HUNDRED)
}

/// Sales performance of one product across all invoices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPerformance {
    /// Catalog id, absent for products only seen on invoices.
    pub product_id: Option<String>,
    pub name: String,
    pub units_sold: Decimal,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin: Option<Decimal>,
    pub average_selling_price: Option<Decimal>,
    /// True when the cost is estimated from the average margin instead of
    /// taken from the catalog.
    pub estimated: bool,
}

/// Sales performance rolled up per supplier, covering catalog-matched
/// products only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierPerformance {
    pub supplier_id: String,
    pub name: String,
    pub units_sold: Decimal,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin: Option<Decimal>,
}

/// One invoice line with its cost basis applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinePerformance {
    pub name: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub estimated: bool,
}

/// Profitability of one invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoicePerformance {
    pub invoice_id: i64,
    pub date: NaiveDateTime,
    pub customer_name: String,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub margin: Option<Decimal>,
    pub lines: Vec<LinePerformance>,
}

/// The full profitability report: products, suppliers and invoices, each
/// sorted by profit, highest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityReport {
    pub products: Vec<ProductPerformance>,
    pub suppliers: Vec<SupplierPerformance>,
    pub invoices: Vec<InvoicePerformance>,
    /// Mean of the positive matched-product margins, in percent. Costs of
    /// unmatched products are estimated with it.
    pub average_margin: Decimal,
    pub skipped: Vec<SkippedInvoice>,
}

#[derive(Default)]
struct Totals {
    units: Decimal,
    revenue: Decimal,
    cost: Decimal,
}

impl Totals {
    fn add(&mut self, units: Decimal, revenue: Decimal, cost: Decimal) {
        self.units += units;
        self.revenue += revenue;
        self.cost += cost;
    }

    fn profit(&self) -> Decimal {
        self.revenue - self.cost
    }

    fn is_empty(&self) -> bool {
        self.units.is_zero() && self.revenue.is_zero() && self.cost.is_zero()
    }
}

struct MatchedTotals {
    product_id: String,
    name: String,
    supplier_id: String,
    totals: Totals,
}

impl ProfitabilityReport {
    /// Builds the report in two pricing passes. Lines found in the catalog
    /// get real costs first; the remaining lines then get costs estimated
    /// from the average margin of the matched ones.
    pub fn compute(invoices: &[Invoice], catalog: &ProductCatalog) -> ProfitabilityReport {
        // First pass: catalog-matched lines at real cost.
        let mut matched: HashMap<String, MatchedTotals> = HashMap::new();
        for invoice in invoices {
            for item in &invoice.items {
                if let Some(product) = catalog.lookup(&item.name) {
                    let entry =
                        matched
                            .entry(normalized(&product.name))
                            .or_insert_with(|| MatchedTotals {
                                product_id: product.id.clone(),
                                name: product.name.clone(),
                                supplier_id: product.supplier.clone(),
                                totals: Totals::default(),
                            });
                    entry
                        .totals
                        .add(item.quantity, item.revenue(), item.quantity * product.cost);
                }
            }
        }

        let positive_margins: Vec<Decimal> = matched
            .values()
            .filter_map(|entry| margin(entry.totals.profit(), entry.totals.revenue))
            .filter(|value| *value > Decimal::ZERO)
            .collect();
        let average_margin = if positive_margins.is_empty() {
            DEFAULT_AVERAGE_MARGIN
        } else {
            positive_margins.iter().copied().sum::<Decimal>()
                / Decimal::from(positive_margins.len())
        };
        let cost_ratio = Decimal::ONE - average_margin / Decimal::ONE_HUNDRED;

        // Second pass: everything the catalog does not know, at estimated
        // cost.
        let mut unmatched: HashMap<String, (String, Totals)> = HashMap::new();
        for invoice in invoices {
            for item in &invoice.items {
                if catalog.lookup(&item.name).is_none() {
                    let (_, totals) = unmatched
                        .entry(normalized(&item.name))
                        .or_insert_with(|| (item.name.trim().to_string(), Totals::default()));
                    let revenue = item.revenue();
                    totals.add(item.quantity, revenue, revenue * cost_ratio);
                }
            }
        }

        // Rows with nothing accumulated are dropped; rows whose units net
        // to zero stay, so revenue keeps reconciling with the invoices.
        let mut products: Vec<ProductPerformance> = matched
            .values()
            .filter(|entry| !entry.totals.is_empty())
            .map(matched_row)
            .chain(
                unmatched
                    .values()
                    .filter(|(_, totals)| !totals.is_empty())
                    .map(|(name, totals)| ProductPerformance {
                        product_id: None,
                        name: name.clone(),
                        units_sold: totals.units,
                        revenue: totals.revenue,
                        cost: totals.cost,
                        profit: totals.profit(),
                        margin: margin(totals.profit(), totals.revenue),
                        average_selling_price: average_price(totals),
                        estimated: true,
                    }),
            )
            .collect();
        products.sort_by(|a, b| b.profit.cmp(&a.profit).then_with(|| a.name.cmp(&b.name)));

        let suppliers = supplier_rows(&matched, catalog);
        let invoices = invoice_rows(invoices, catalog, cost_ratio);

        debug!(
            products = products.len(),
            suppliers = suppliers.len(),
            invoices = invoices.len(),
            %average_margin,
            "profitability report built"
        );

        ProfitabilityReport {
            products,
            suppliers,
            invoices,
            average_margin,
            skipped: Vec::new(),
        }
    }

    /// Validates raw backend rows first, then builds the report from the
    /// good ones. Malformed rows end up in `skipped`.
    pub fn from_records(
        records: Vec<InvoiceRecord>,
        catalog: &ProductCatalog,
    ) -> ProfitabilityReport {
        let (invoices, skipped) = decode_invoices(records);
        let mut report = ProfitabilityReport::compute(&invoices, catalog);
        report.skipped = skipped;
        report
    }

    /// Products sold but missing from the catalog, candidates for adding.
    pub fn unmatched(&self) -> impl Iterator<Item = &ProductPerformance> {
        self.products.iter().filter(|product| product.estimated)
    }

    pub fn total_revenue(&self) -> Decimal {
        self.products.iter().map(|product| product.revenue).sum()
    }

    pub fn total_profit(&self) -> Decimal {
        self.products.iter().map(|product| product.profit).sum()
    }
}

fn average_price(totals: &Totals) -> Option<Decimal> {
    (!totals.units.is_zero()).then(|| totals.revenue / totals.units)
}

fn matched_row(entry: &MatchedTotals) -> ProductPerformance {
    ProductPerformance {
        product_id: Some(entry.product_id.clone()),
        name: entry.name.clone(),
        units_sold: entry.totals.units,
        revenue: entry.totals.revenue,
        cost: entry.totals.cost,
        profit: entry.totals.profit(),
        margin: margin(entry.totals.profit(), entry.totals.revenue),
        average_selling_price: average_price(&entry.totals),
        estimated: false,
    }
}

fn supplier_rows(
    matched: &HashMap<String, MatchedTotals>,
    catalog: &ProductCatalog,
) -> Vec<SupplierPerformance> {
    let mut by_supplier: HashMap<&str, Totals> = HashMap::new();
    for entry in matched.values() {
        if entry.totals.is_empty() {
            continue;
        }
        let totals = by_supplier.entry(&entry.supplier_id).or_default();
        totals.add(entry.totals.units, entry.totals.revenue, entry.totals.cost);
    }

    let mut rows: Vec<SupplierPerformance> = by_supplier
        .into_iter()
        .map(|(supplier_id, totals)| SupplierPerformance {
            supplier_id: supplier_id.to_string(),
            // Fall back to the raw id when the supplier row is gone.
            name: catalog
                .supplier(supplier_id)
                .map_or_else(|| supplier_id.to_string(), |supplier| supplier.name.clone()),
            units_sold: totals.units,
            revenue: totals.revenue,
            cost: totals.cost,
            profit: totals.profit(),
            margin: margin(totals.profit(), totals.revenue),
        })
        .collect();
    rows.sort_by(|a, b| b.profit.cmp(&a.profit).then_with(|| a.name.cmp(&b.name)));
    rows
}

fn invoice_rows(
    invoices: &[Invoice],
    catalog: &ProductCatalog,
    cost_ratio: Decimal,
) -> Vec<InvoicePerformance> {
    let mut rows = Vec::with_capacity(invoices.len());
    for invoice in invoices {
        let mut lines = Vec::with_capacity(invoice.items.len());
        let mut revenue = Decimal::ZERO;
        let mut cost = Decimal::ZERO;

        for item in &invoice.items {
            let line_revenue = item.revenue();
            let (line_cost, estimated) = match catalog.lookup(&item.name) {
                Some(product) => (item.quantity * product.cost, false),
                None => (line_revenue * cost_ratio, true),
            };
            revenue += line_revenue;
            cost += line_cost;
            lines.push(LinePerformance {
                name: item.name.clone(),
                quantity: item.quantity,
                price: item.price,
                revenue: line_revenue,
                cost: line_cost,
                profit: line_revenue - line_cost,
                estimated,
            });
        }

        rows.push(InvoicePerformance {
            invoice_id: invoice.id,
            date: invoice.date,
            customer_name: invoice.customer_name.clone(),
            revenue,
            cost,
            profit: revenue - cost,
            margin: margin(revenue - cost, revenue),
            lines,
        });
    }
    rows.sort_by(|a, b| b.profit.cmp(&a.profit).then_with(|| a.invoice_id.cmp(&b.invoice_id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Product, Supplier};
    use crate::invoice::{LineItem, PaymentSplit};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn item(name: &str, quantity: Decimal, price: Decimal) -> LineItem {
        LineItem {
            name: name.to_string(),
            quantity,
            price,
        }
    }

    fn invoice(id: i64, items: Vec<LineItem>) -> Invoice {
        let total = items.iter().map(LineItem::revenue).sum();
        Invoice {
            id,
            date: NaiveDate::from_ymd_opt(2024, 2, 10)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            customer_name: "Walk-in".to_string(),
            customer_number: None,
            items,
            total,
            note: None,
            payments: PaymentSplit::default(),
        }
    }

    fn product(id: &str, name: &str, cost: Decimal, supplier: &str) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            cost,
            selling_price: cost * dec!(2),
            supplier: supplier.to_string(),
        }
    }

    fn pen_catalog() -> ProductCatalog {
        ProductCatalog::new(
            vec![product("p-pen", "Pen", dec!(5), "sup-1")],
            vec![Supplier {
                id: "sup-1".to_string(),
                name: "Acme Stationers".to_string(),
                code: 1,
            }],
        )
    }

    #[test]
    fn matched_product_gets_catalog_costs() {
        let report = ProfitabilityReport::compute(
            &[invoice(1, vec![item("Pen", dec!(10), dec!(8))])],
            &pen_catalog(),
        );

        let pen = &report.products[0];
        assert_eq!(pen.product_id.as_deref(), Some("p-pen"));
        assert_eq!(pen.units_sold, dec!(10));
        assert_eq!(pen.revenue, dec!(80));
        assert_eq!(pen.cost, dec!(50));
        assert_eq!(pen.profit, dec!(30));
        assert_eq!(pen.margin, Some(dec!(37.5)));
        assert_eq!(pen.average_selling_price, Some(dec!(8)));
        assert!(!pen.estimated);
    }

    #[test]
    fn matching_ignores_case_and_whitespace() {
        let report = ProfitabilityReport::compute(
            &[invoice(1, vec![item("  PEN ", dec!(2), dec!(8))])],
            &pen_catalog(),
        );

        assert_eq!(report.products.len(), 1);
        // The catalog spelling is the display name.
        assert_eq!(report.products[0].name, "Pen");
        assert!(!report.products[0].estimated);
    }

    #[test]
    fn unmatched_costs_come_from_the_average_margin() {
        // One matched sale at a 50% margin, one product the catalog does
        // not know.
        let catalog = ProductCatalog::new(
            vec![product("p-pen", "Pen", dec!(4), "sup-1")],
            Vec::new(),
        );
        let report = ProfitabilityReport::compute(
            &[invoice(
                1,
                vec![
                    item("Pen", dec!(1), dec!(8)),
                    item("Mystery Box", dec!(2), dec!(20)),
                ],
            )],
            &catalog,
        );

        assert_eq!(report.average_margin, dec!(50));
        let mystery = report
            .products
            .iter()
            .find(|product| product.name == "Mystery Box")
            .unwrap();
        assert!(mystery.estimated);
        assert_eq!(mystery.product_id, None);
        assert_eq!(mystery.revenue, dec!(40));
        assert_eq!(mystery.cost, dec!(20));
        assert_eq!(mystery.profit, dec!(20));
    }

    #[test]
    fn default_margin_applies_without_matched_sales() {
        let report = ProfitabilityReport::compute(
            &[invoice(1, vec![item("Mystery Box", dec!(1), dec!(100))])],
            &ProductCatalog::default(),
        );

        assert_eq!(report.average_margin, DEFAULT_AVERAGE_MARGIN);
        assert_eq!(report.products[0].cost, dec!(80));
        assert_eq!(report.products[0].profit, dec!(20));
    }

    #[test]
    fn average_skips_negative_margins() {
        // Pencil sells below cost; only the Pen margin (50%) counts.
        let catalog = ProductCatalog::new(
            vec![
                product("p-pen", "Pen", dec!(4), "sup-1"),
                product("p-pencil", "Pencil", dec!(10), "sup-1"),
            ],
            Vec::new(),
        );
        let report = ProfitabilityReport::compute(
            &[invoice(
                1,
                vec![
                    item("Pen", dec!(1), dec!(8)),
                    item("Pencil", dec!(1), dec!(6)),
                ],
            )],
            &catalog,
        );

        assert_eq!(report.average_margin, dec!(50));
    }

    #[test]
    fn zero_revenue_leaves_the_margin_undefined() {
        let report = ProfitabilityReport::compute(
            &[invoice(1, vec![item("Pen", dec!(3), dec!(0))])],
            &pen_catalog(),
        );

        let pen = &report.products[0];
        assert_eq!(pen.revenue, dec!(0));
        assert_eq!(pen.cost, dec!(15));
        assert_eq!(pen.margin, None);
        assert_eq!(report.invoices[0].margin, None);
    }

    #[test]
    fn profit_is_revenue_minus_cost_everywhere() {
        let catalog = pen_catalog();
        let report = ProfitabilityReport::compute(
            &[
                invoice(
                    1,
                    vec![
                        item("Pen", dec!(3), dec!(8)),
                        item("Mystery Box", dec!(1), dec!(50)),
                    ],
                ),
                invoice(2, vec![item("Pen", dec!(2), dec!(7.50))]),
            ],
            &catalog,
        );

        for product in &report.products {
            assert_eq!(product.profit, product.revenue - product.cost);
        }
        for supplier in &report.suppliers {
            assert_eq!(supplier.profit, supplier.revenue - supplier.cost);
        }
        for invoice in &report.invoices {
            assert_eq!(invoice.profit, invoice.revenue - invoice.cost);
            for line in &invoice.lines {
                assert_eq!(line.profit, line.revenue - line.cost);
            }
        }
    }

    #[test]
    fn revenue_and_cost_are_conserved_across_views() {
        let report = ProfitabilityReport::compute(
            &[
                invoice(
                    1,
                    vec![
                        item("Pen", dec!(3), dec!(8)),
                        item("Mystery Box", dec!(1), dec!(50)),
                    ],
                ),
                invoice(2, vec![item("pen", dec!(2), dec!(7.50))]),
            ],
            &pen_catalog(),
        );

        let from_invoices: Decimal = report.invoices.iter().map(|row| row.revenue).sum();
        assert_eq!(report.total_revenue(), from_invoices);

        let cost_from_products: Decimal = report.products.iter().map(|row| row.cost).sum();
        let cost_from_invoices: Decimal = report.invoices.iter().map(|row| row.cost).sum();
        assert_eq!(cost_from_products, cost_from_invoices);

        let profit_from_invoices: Decimal = report.invoices.iter().map(|row| row.profit).sum();
        assert_eq!(report.total_profit(), profit_from_invoices);
    }

    #[test]
    fn netted_out_units_keep_their_revenue_on_the_books() {
        // A sale and a zero-priced return of the same product: units net
        // to zero but the revenue is real and must stay reconciled.
        let report = ProfitabilityReport::compute(
            &[invoice(
                1,
                vec![
                    item("Pen", dec!(2), dec!(10)),
                    item("Pen", dec!(-2), dec!(0)),
                ],
            )],
            &pen_catalog(),
        );

        let pen = &report.products[0];
        assert_eq!(pen.units_sold, dec!(0));
        assert_eq!(pen.revenue, dec!(20));
        assert_eq!(pen.cost, dec!(0));
        assert_eq!(pen.average_selling_price, None);

        let from_invoices: Decimal = report.invoices.iter().map(|row| row.revenue).sum();
        assert_eq!(report.total_revenue(), from_invoices);
    }

    #[test]
    fn lines_with_nothing_accumulated_produce_no_rows() {
        let report = ProfitabilityReport::compute(
            &[invoice(1, vec![item("Pen", dec!(0), dec!(0))])],
            &pen_catalog(),
        );
        assert!(report.products.is_empty());
        assert!(report.suppliers.is_empty());
    }

    #[test]
    fn suppliers_roll_up_their_products() {
        let catalog = ProductCatalog::new(
            vec![
                product("p-pen", "Pen", dec!(4), "sup-1"),
                product("p-pencil", "Pencil", dec!(2), "sup-1"),
                product("p-tape", "Tape", dec!(10), "sup-2"),
            ],
            vec![Supplier {
                id: "sup-1".to_string(),
                name: "Acme Stationers".to_string(),
                code: 1,
            }],
        );
        let report = ProfitabilityReport::compute(
            &[invoice(
                1,
                vec![
                    item("Pen", dec!(2), dec!(8)),
                    item("Pencil", dec!(5), dec!(3)),
                    item("Tape", dec!(1), dec!(15)),
                ],
            )],
            &catalog,
        );

        assert_eq!(report.suppliers.len(), 2);
        let acme = report
            .suppliers
            .iter()
            .find(|supplier| supplier.supplier_id == "sup-1")
            .unwrap();
        assert_eq!(acme.name, "Acme Stationers");
        assert_eq!(acme.units_sold, dec!(7));
        assert_eq!(acme.revenue, dec!(31));
        assert_eq!(acme.cost, dec!(18));

        // No supplier row in the catalog: the id stands in for the name.
        let other = report
            .suppliers
            .iter()
            .find(|supplier| supplier.supplier_id == "sup-2")
            .unwrap();
        assert_eq!(other.name, "sup-2");
    }

    #[test]
    fn products_are_sorted_by_profit() {
        let catalog = ProductCatalog::new(
            vec![
                product("p-pen", "Pen", dec!(4), "sup-1"),
                product("p-tape", "Tape", dec!(1), "sup-1"),
            ],
            Vec::new(),
        );
        let report = ProfitabilityReport::compute(
            &[invoice(
                1,
                vec![
                    item("Pen", dec!(1), dec!(5)),
                    item("Tape", dec!(1), dec!(20)),
                ],
            )],
            &catalog,
        );

        let names: Vec<&str> = report
            .products
            .iter()
            .map(|product| product.name.as_str())
            .collect();
        assert_eq!(names, vec!["Tape", "Pen"]);
    }

    #[test]
    fn unmatched_lists_only_estimated_rows() {
        let report = ProfitabilityReport::compute(
            &[invoice(
                1,
                vec![
                    item("Pen", dec!(1), dec!(8)),
                    item("Mystery Box", dec!(1), dec!(50)),
                ],
            )],
            &pen_catalog(),
        );

        let names: Vec<&str> = report
            .unmatched()
            .map(|product| product.name.as_str())
            .collect();
        assert_eq!(names, vec!["Mystery Box"]);
    }

    #[test]
    fn empty_input_gives_an_empty_report() {
        let report = ProfitabilityReport::compute(&[], &pen_catalog());
        assert!(report.products.is_empty());
        assert!(report.suppliers.is_empty());
        assert!(report.invoices.is_empty());
        assert_eq!(report.average_margin, DEFAULT_AVERAGE_MARGIN);
        assert_eq!(report.total_revenue(), dec!(0));
    }

    #[test]
    fn from_records_reports_undecodable_rows() {
        let good = InvoiceRecord {
            id: 1,
            date: "2024-02-10T12:30:00".to_string(),
            customer_name: "Walk-in".to_string(),
            customer_number: None,
            products: r#"[{"name": "Pen", "quantity": 1, "price": 8}]"#.to_string(),
            total: dec!(8),
            note: None,
            cash: Some(dec!(8)),
            upi: None,
            credit: None,
        };
        let bad = InvoiceRecord {
            id: 2,
            products: "oops".to_string(),
            ..good.clone()
        };

        let report = ProfitabilityReport::from_records(vec![good, bad], &pen_catalog());

        assert_eq!(report.products.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, 2);
    }
}
