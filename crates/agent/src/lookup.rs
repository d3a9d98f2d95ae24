use std::sync::Arc;

use thiserror::Error;

use shopkeep_core::domain::intent::{Intent, IntentAction};
use shopkeep_core::domain::product::Product;
use shopkeep_db::repositories::{CatalogRepository, RepositoryError};

/// Store failure while serving a lookup. The display text is sent to the user as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{description}")]
pub struct LookupError {
    pub description: String,
}

impl From<RepositoryError> for LookupError {
    fn from(error: RepositoryError) -> Self {
        Self {
            description: format!(
                "Sorry, an error occurred while retrieving data from the catalog: {error}"
            ),
        }
    }
}

/// Maps an [`Intent`] onto exactly one catalog read, or none.
#[derive(Clone)]
pub struct CatalogLookup {
    catalog: Arc<dyn CatalogRepository>,
}

impl CatalogLookup {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog }
    }

    /// `Ok(None)` means "no data": the action is not a catalog read, or its
    /// required parameter is missing. The store is not touched in that case.
    pub async fn dispatch(&self, intent: &Intent) -> Result<Option<Vec<Product>>, LookupError> {
        if intent.action == IntentAction::FetchAllProducts {
            return Ok(Some(self.catalog.list_all().await?));
        }

        let Some(field) = intent.action.filter_field() else {
            return Ok(None);
        };
        let Some(value) = intent.param(field.as_str()) else {
            return Ok(None);
        };
        let records = self.catalog.find_by_exact(field, value).await?;

        Ok(Some(records))
    }
}
