use async_trait::async_trait;
use thiserror::Error;

use shopkeep_core::domain::product::{CatalogField, NewProduct, Product, ProductId, ProductPatch};
use shopkeep_core::errors::DomainError;

pub mod memory;
pub mod product;

pub use memory::InMemoryCatalogRepository;
pub use product::SqlCatalogRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// The only boundary between the rest of the workspace and stored catalog records.
///
/// Reads are served to the chat pipeline; writes come from the admin surface.
/// Every write touches a single record and the last writer wins.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Every record, in insertion order.
    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Records whose `field` equals `value` exactly. No case folding, no prefix match.
    async fn find_by_exact(
        &self,
        field: CatalogField,
        value: &str,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Merges `patch` onto the stored record. `Ok(None)` when `id` does not exist.
    async fn update_partial(
        &self,
        id: &ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns whether a record was removed. A missing id is not an error.
    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError>;
}
