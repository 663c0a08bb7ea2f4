use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Purchase cost per unit.
    pub cost: Decimal,
    #[serde(rename = "sellingPrice")]
    pub selling_price: Decimal,
    /// Id of the supplier the product is bought from.
    pub supplier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    /// Three-digit code embedded in the supplier's barcodes.
    pub code: u32,
}

/// Canonical form of a product name for matching: trimmed and lowercased.
pub fn normalized(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The product catalog indexed for name lookups.
///
/// When two products share a normalized name the later row wins.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
    by_name: HashMap<String, usize>,
    suppliers: HashMap<String, Supplier>,
}

impl ProductCatalog {
    pub fn new(products: Vec<Product>, suppliers: Vec<Supplier>) -> ProductCatalog {
        let by_name = products
            .iter()
            .enumerate()
            .map(|(index, product)| (normalized(&product.name), index))
            .collect();
        let suppliers = suppliers
            .into_iter()
            .map(|supplier| (supplier.id.clone(), supplier))
            .collect();

        ProductCatalog {
            products,
            by_name,
            suppliers,
        }
    }

    /// Finds a product by name, ignoring case and surrounding whitespace.
    pub fn lookup(&self, name: &str) -> Option<&Product> {
        self.by_name
            .get(&normalized(name))
            .map(|&index| &self.products[index])
    }

    pub fn supplier(&self, id: &str) -> Option<&Supplier> {
        self.suppliers.get(id)
    }

    /// Supplier a product is bought from, when its row still exists.
    pub fn supplier_of(&self, product: &Product) -> Option<&Supplier> {
        self.supplier(&product.supplier)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

/// Next free three-digit supplier code, starting from 1.
pub fn next_supplier_code(suppliers: &[Supplier]) -> u32 {
    suppliers
        .iter()
        .map(|supplier| supplier.code)
        .max()
        .map_or(1, |max| max + 1)
}

/// Next barcode under a supplier: the three-digit supplier code followed
/// by a five-digit serial, one past the serial of `last_barcode`.
pub fn next_barcode(supplier_code: u32, last_barcode: Option<&str>) -> String {
    let last_serial = last_barcode
        .and_then(|code| code.get(code.len().saturating_sub(5)..))
        .and_then(|tail| tail.parse::<u32>().ok())
        .unwrap_or(0);
    format!("{:03}{:05}", supplier_code, last_serial + 1)
}
