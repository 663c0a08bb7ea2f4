use std::collections::HashMap;

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::normalized;
use crate::invoice::Invoice;

/// Month-over-month unit growth of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthGrowth {
    /// Sold this month with no baseline the month before.
    New,
    /// Percentage change in units against the month before.
    Rate(Decimal),
}

/// Units sold this month and the month before, with the growth between.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTrend {
    pub name: String,
    pub current_units: Decimal,
    pub previous_units: Decimal,
    pub growth: MonthGrowth,
}

/// Year and month immediately before the given one.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn units_by_product(
    invoices: &[Invoice],
    year: i32,
    month: u32,
) -> HashMap<String, (String, Decimal)> {
    let mut units: HashMap<String, (String, Decimal)> = HashMap::new();
    for invoice in invoices {
        if invoice.date.year() != year || invoice.date.month() != month {
            continue;
        }
        for item in &invoice.items {
            let (_, total) = units
                .entry(normalized(&item.name))
                .or_insert_with(|| (item.name.trim().to_string(), Decimal::ZERO));
            *total += item.quantity;
        }
    }
    units
}

/// Compares the units sold per product in the given month against the
/// month before. Products seen in either month get a trend; a product
/// without prior-month sales is marked `New` rather than given an
/// undefined rate. Sorted by product name.
pub fn product_trends(invoices: &[Invoice], year: i32, month: u32) -> Vec<ProductTrend> {
    let (prev_year, prev_month) = previous_month(year, month);
    let current = units_by_product(invoices, year, month);
    let previous = units_by_product(invoices, prev_year, prev_month);

    let mut keys: Vec<&String> = current.keys().chain(previous.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut trends = Vec::with_capacity(keys.len());
    for key in keys {
        let current_entry = current.get(key);
        let previous_entry = previous.get(key);
        let name = current_entry
            .or(previous_entry)
            .map_or_else(|| key.clone(), |(name, _)| name.clone());
        let current_units = current_entry.map_or(Decimal::ZERO, |(_, units)| *units);
        let previous_units = previous_entry.map_or(Decimal::ZERO, |(_, units)| *units);

        let growth = if previous_units.is_zero() {
            MonthGrowth::New
        } else {
            MonthGrowth::Rate(
                (current_units - previous_units) / previous_units * Decimal::ONE_HUNDRED,
            )
        };

        trends.push(ProductTrend {
            name,
            current_units,
            previous_units,
            growth,
        });
    }
    trends
}

/// The trend with the highest growth rate. Products marked `New` have no
/// rate to compare, so they only win when nothing has a rate; among those
/// the one with the most current units is picked.
pub fn top_growing(trends: &[ProductTrend]) -> Option<&ProductTrend> {
    let mut best: Option<(&ProductTrend, Decimal)> = None;
    for trend in trends {
        if let MonthGrowth::Rate(rate) = trend.growth {
            if best.map_or(true, |(_, top)| rate > top) {
                best = Some((trend, rate));
            }
        }
    }
    if let Some((trend, _)) = best {
        return Some(trend);
    }

    trends
        .iter()
        .filter(|trend| trend.growth == MonthGrowth::New)
        .max_by_key(|trend| trend.current_units)
}
