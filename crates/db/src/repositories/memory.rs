use chrono::Utc;
use tokio::sync::RwLock;

use shopkeep_core::domain::product::{CatalogField, NewProduct, Product, ProductId, ProductPatch};

use super::{CatalogRepository, RepositoryError};

/// Catalog kept in process memory. Backs tests and `shopkeep ask --in-memory`.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    // Vec keeps insertion order, which `list_all` promises.
    products: RwLock<Vec<Product>>,
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.clone())
    }

    async fn find_by_exact(
        &self,
        field: CatalogField,
        value: &str,
    ) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().filter(|product| field.value_of(product) == value).cloned().collect())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.id == id).cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        product.validate()?;
        let product = product.normalized();
        let now = Utc::now();
        let created = Product {
            id: ProductId(uuid::Uuid::new_v4().to_string()),
            name: product.name,
            price: product.price,
            stock: product.stock,
            category: product.category,
            created_at: now,
            updated_at: now,
        };

        self.products.write().await.push(created.clone());
        Ok(created)
    }

    async fn update_partial(
        &self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        patch.validate()?;

        let mut products = self.products.write().await;
        let Some(product) = products.iter_mut().find(|product| &product.id == id) else {
            return Ok(None);
        };
        patch.apply_to(product, Utc::now());
        Ok(Some(product.clone()))
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|product| &product.id != id);
        Ok(products.len() != before)
    }
}
