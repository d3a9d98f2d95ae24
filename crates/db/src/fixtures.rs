use rust_decimal::Decimal;

use shopkeep_core::domain::product::NewProduct;

use crate::repositories::{CatalogRepository, RepositoryError};

/// Demo catalog used by `shopkeep seed` and by tests that want realistic data.
///
/// Covers the three shapes the assistant answers: a single-model lookup
/// (`iPhone 15`), a multi-record category (`Laptops`), and a low-price accessory.
pub struct SampleCatalog;

struct SampleProduct {
    name: &'static str,
    price: i64,
    stock: u32,
    category: &'static str,
}

const SAMPLE_PRODUCTS: &[SampleProduct] = &[
    SampleProduct { name: "iPhone 15", price: 35000, stock: 100, category: "Smartphones" },
    SampleProduct { name: "MacBook Air M3", price: 45000, stock: 50, category: "Laptops" },
    SampleProduct { name: "Dell XPS 15", price: 55000, stock: 30, category: "Laptops" },
    SampleProduct { name: "Keyboard", price: 1500, stock: 200, category: "Accessories" },
];

impl SampleCatalog {
    pub fn products() -> Vec<NewProduct> {
        SAMPLE_PRODUCTS
            .iter()
            .map(|sample| NewProduct {
                name: sample.name.to_string(),
                price: Decimal::new(sample.price, 0),
                stock: sample.stock,
                category: sample.category.to_string(),
            })
            .collect()
    }

    /// Inserts the sample catalog unless the store already holds records.
    pub async fn load(repository: &dyn CatalogRepository) -> Result<SeedResult, RepositoryError> {
        let existing = repository.list_all().await?.len();
        if existing > 0 {
            tracing::info!(
                event_name = "db.seed.skipped",
                existing_records = existing,
                "catalog already populated; seed skipped"
            );
            return Ok(SeedResult { inserted: Vec::new(), skipped_existing: existing });
        }

        let mut inserted = Vec::with_capacity(SAMPLE_PRODUCTS.len());
        for product in Self::products() {
            let created = repository.create(product).await?;
            inserted.push(created.name);
        }

        tracing::info!(
            event_name = "db.seed.completed",
            inserted_records = inserted.len(),
            "sample catalog inserted"
        );
        Ok(SeedResult { inserted, skipped_existing: 0 })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub inserted: Vec<String>,
    pub skipped_existing: usize,
}
