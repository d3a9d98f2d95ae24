use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use shopkeep_core::domain::product::{CatalogField, NewProduct, Product, ProductId, ProductPatch};
use shopkeep_db::repositories::{CatalogRepository, RepositoryError};

/// Catalog whose every operation fails. Counts calls so tests can assert it was never touched.
#[derive(Default)]
pub(crate) struct BrokenCatalog {
    calls: AtomicUsize,
}

impl BrokenCatalog {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> RepositoryError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        RepositoryError::Decode("disk on fire".to_string())
    }
}

#[async_trait]
impl CatalogRepository for BrokenCatalog {
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Err(self.fail())
    }

    async fn find_by_exact(
        &self,
        _field: CatalogField,
        _value: &str,
    ) -> Result<Vec<Product>, RepositoryError> {
        Err(self.fail())
    }

    async fn get(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Err(self.fail())
    }

    async fn create(&self, _product: NewProduct) -> Result<Product, RepositoryError> {
        Err(self.fail())
    }

    async fn update_partial(
        &self,
        _id: &ProductId,
        _patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        Err(self.fail())
    }

    async fn delete(&self, _id: &ProductId) -> Result<bool, RepositoryError> {
        Err(self.fail())
    }
}
